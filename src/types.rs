#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Mixes `other` over `self`; `t` is the weight of `other`.
    pub fn blend(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;

        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}

/// Fill color of the fade overlay.
pub const BACKGROUND: Rgb = Rgb(2, 12, 27);

/// Per-slot animation state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Column {
    /// Row coordinate of the head glyph, in cells. Negative while entering.
    pub head: f64,
    /// Index into the phrase catalog, `None` while idle.
    pub phrase: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimatorState {
    Uninitialized,
    Sized,
    Running,
    Paused,
    Stopped,
}
