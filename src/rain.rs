use crate::{
    config::AnimatorConfig,
    error::SurfaceError,
    types::{AnimatorState, BACKGROUND, Column, Rgb},
};

use rand::Rng;
use std::time::Instant;
use tracing::{debug, trace};

const MIN_SURFACE_WIDTH: f64 = 300.0;
const MIN_COLUMNS: usize = 2;
const START_OFFSET_SPREAD: f64 = 50.0;
const ENTRY_OFFSET_SPREAD: f64 = 6.0;
const IDLE_DRIFT: f64 = 0.05;
const TAIL_DIMMING: f32 = 0.55;
const KEEP_CHANCE: f64 = 0.85;
const FALLBACK_GLYPH: char = '本';

/// A drawing target measured in device pixels.
pub trait Surface {
    /// Layout size in CSS pixels.
    fn client_size(&self) -> (f64, f64);
    fn pixel_ratio(&self) -> f64;
    /// Sets the backing size in device pixels.
    fn resize(&mut self, width: u32, height: u32);
    fn set_font(&mut self, px: u32, family: &str);
    fn clear(&mut self);
    /// Paints `color` over the whole surface with the given opacity.
    fn fill(&mut self, color: Rgb, alpha: f32);
    fn draw_glyph(
        &mut self,
        ch: char,
        x: f64,
        y: f64,
        color: Rgb,
        alpha: f32,
    ) -> Result<(), SurfaceError>;
}

pub trait RandomSource {
    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f64;
    /// Uniform in `[0, n)`; `n` is never zero.
    fn below(&mut self, n: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn unit(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn below(&mut self, n: usize) -> usize {
        self.random_range(0..n)
    }
}

/// Drops phrases down the columns of a surface, fading older frames into
/// trails.
pub struct Animator<S, R> {
    state: AnimatorState,
    surface: Option<S>,
    rng: R,
    catalog: Vec<Vec<char>>,
    columns: Vec<Column>,
    width: f64,
    height: f64,
    last_draw: Option<Instant>,
}

impl<S: Surface, R: RandomSource> Animator<S, R> {
    /// Without a surface the animator is stopped for good.
    pub fn new(surface: Option<S>, catalog: &[String], rng: R) -> Self {
        let state = if surface.is_some() {
            AnimatorState::Uninitialized
        } else {
            AnimatorState::Stopped
        };

        Self {
            state,
            surface,
            rng,
            catalog: catalog.iter().map(|p| p.chars().collect()).collect(),
            columns: Vec::new(),
            width: 0.0,
            height: 0.0,
            last_draw: None,
        }
    }

    pub fn state(&self) -> AnimatorState {
        self.state
    }

    /// Whether the host should keep delivering frame callbacks.
    pub fn is_scheduled(&self) -> bool {
        self.state == AnimatorState::Running
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn start(&mut self, config: &AnimatorConfig) {
        if self.state == AnimatorState::Stopped {
            return;
        }

        self.resize(config);
        self.draw_test_glyph(config);
        self.last_draw = None;
        self.state = AnimatorState::Running;
        debug!(columns = self.columns.len(), "animator running");
    }

    /// Recomputes the geometry and resets every column. Progress of phrases
    /// in flight is dropped.
    pub fn resize(&mut self, config: &AnimatorConfig) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let ratio = sanitize_ratio(surface.pixel_ratio());
        let cell = config.cell_size * ratio;
        let (client_width, _) = surface.client_size();

        self.width = client_width.max(MIN_SURFACE_WIDTH) * ratio;
        self.height = config.height * ratio;

        surface.resize(self.width.round() as u32, self.height.round() as u32);
        surface.set_font(cell.round() as u32, &config.font_family);

        let count = ((self.width / cell).floor() as usize).max(MIN_COLUMNS);
        self.columns = (0..count)
            .map(|_| Column {
                head: (self.rng.unit() * START_OFFSET_SPREAD).floor(),
                phrase: None,
            })
            .collect();

        if self.state == AnimatorState::Uninitialized {
            self.state = AnimatorState::Sized;
        }

        debug!(
            width = self.width,
            height = self.height,
            columns = count,
            "animator sized"
        );
    }

    /// Host visibility signal. Hiding cancels the frame callback, showing
    /// resumes it with the next frame drawn right away.
    pub fn set_hidden(&mut self, hidden: bool) {
        match (self.state, hidden) {
            (AnimatorState::Running, true) => {
                self.state = AnimatorState::Paused;
                debug!("animator paused");
            }
            (AnimatorState::Paused, false) => {
                self.last_draw = None;
                self.state = AnimatorState::Running;
                debug!("animator resumed");
            }
            _ => {}
        }
    }

    /// Frame callback. Returns true when a frame was drawn.
    pub fn tick(&mut self, now: Instant, config: &AnimatorConfig) -> bool {
        if self.state != AnimatorState::Running {
            return false;
        }

        if let Some(last) = self.last_draw {
            if now.saturating_duration_since(last) < config.interval {
                return false;
            }
        }

        self.last_draw = Some(now);
        self.draw_frame(config);

        true
    }

    fn draw_test_glyph(&mut self, config: &AnimatorConfig) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let ch = self
            .catalog
            .first()
            .and_then(|p| p.first().copied())
            .unwrap_or(FALLBACK_GLYPH);

        surface.clear();
        if let Err(e) = surface.draw_glyph(ch, 10.0, 10.0, config.accent, 1.0) {
            trace!(%e, "test glyph dropped");
        }
    }

    fn draw_frame(&mut self, config: &AnimatorConfig) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let cell = config.cell_size * sanitize_ratio(surface.pixel_ratio());
        let head_alpha = config.glyph_alpha.clamp(0.0, 1.0);
        let tail_alpha = head_alpha * TAIL_DIMMING;

        surface.fill(BACKGROUND, config.trail_alpha);

        for (i, column) in self.columns.iter_mut().enumerate() {
            if column.phrase.is_none() {
                if !self.catalog.is_empty() && self.rng.unit() < config.density {
                    column.phrase = Some(self.rng.below(self.catalog.len()));
                    column.head = -(self.rng.unit() * ENTRY_OFFSET_SPREAD).floor();
                } else {
                    column.head += config.speed * IDLE_DRIFT;
                    continue;
                }
            }

            let Some(phrase) = column.phrase.and_then(|p| self.catalog.get(p)) else {
                column.phrase = None;
                continue;
            };

            let len = phrase.len() as f64;
            let x = (i as f64 * cell).round();
            let head_y = (column.head * cell).round();

            for (j, &ch) in phrase.iter().enumerate() {
                let y = head_y - (len - 1.0 - j as f64) * cell;
                if y < -cell || y > self.height + cell {
                    continue;
                }

                let alpha = if j + 1 == phrase.len() {
                    head_alpha
                } else {
                    tail_alpha
                };

                if let Err(e) = surface.draw_glyph(ch, x, y, config.accent, alpha) {
                    trace!(%e, "glyph dropped");
                }
            }

            column.head += config.speed;

            if head_y - len * cell > self.height && self.rng.unit() > KEEP_CHANCE {
                column.phrase = None;
                column.head = 0.0;
            }
        }
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleEnv;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::{collections::VecDeque, time::Duration};

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Clear,
        Fill(f32),
        Glyph { ch: char, x: f64, y: f64, alpha: f32 },
    }

    struct Recorder {
        client: (f64, f64),
        ratio: f64,
        size: (u32, u32),
        font: Option<(u32, String)>,
        fail_glyphs: bool,
        ops: Vec<Op>,
    }

    impl Recorder {
        fn new(width: f64) -> Self {
            Self {
                client: (width, 140.0),
                ratio: 1.0,
                size: (0, 0),
                font: None,
                fail_glyphs: false,
                ops: Vec::new(),
            }
        }

        fn glyphs(&self) -> Vec<(char, f64, f64, f32)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Glyph { ch, x, y, alpha } => Some((*ch, *x, *y, *alpha)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for Recorder {
        fn client_size(&self) -> (f64, f64) {
            self.client
        }

        fn pixel_ratio(&self) -> f64 {
            self.ratio
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn set_font(&mut self, px: u32, family: &str) {
            self.font = Some((px, family.to_string()));
        }

        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }

        fn fill(&mut self, _color: Rgb, alpha: f32) {
            self.ops.push(Op::Fill(alpha));
        }

        fn draw_glyph(
            &mut self,
            ch: char,
            x: f64,
            y: f64,
            _color: Rgb,
            alpha: f32,
        ) -> Result<(), SurfaceError> {
            if self.fail_glyphs {
                return Err(SurfaceError::OutOfBounds { x, y });
            }
            self.ops.push(Op::Glyph { ch, x, y, alpha });
            Ok(())
        }
    }

    /// Hands out queued values first, then `fallback` forever.
    struct Scripted {
        queue: VecDeque<f64>,
        fallback: f64,
    }

    impl Scripted {
        fn constant(value: f64) -> Self {
            Self {
                queue: VecDeque::new(),
                fallback: value,
            }
        }
    }

    impl RandomSource for Scripted {
        fn unit(&mut self) -> f64 {
            self.queue.pop_front().unwrap_or(self.fallback)
        }

        fn below(&mut self, _n: usize) -> usize {
            0
        }
    }

    fn catalog() -> Vec<String> {
        vec!["あいうえお".to_string(), "古池や".to_string()]
    }

    fn config() -> AnimatorConfig {
        AnimatorConfig {
            interval: Duration::ZERO,
            ..AnimatorConfig::default()
        }
    }

    fn running<R: RandomSource>(
        width: f64,
        rng: R,
        config: &AnimatorConfig,
    ) -> Animator<Recorder, R> {
        let mut animator = Animator::new(Some(Recorder::new(width)), &catalog(), rng);
        animator.start(config);
        animator.surface_mut().unwrap().ops.clear();
        animator
    }

    #[test]
    fn test_missing_surface_stops() {
        let mut animator: Animator<Recorder, _> =
            Animator::new(None, &catalog(), StdRng::seed_from_u64(1));
        assert_eq!(animator.state(), AnimatorState::Stopped);

        animator.start(&config());
        animator.set_hidden(false);
        assert_eq!(animator.state(), AnimatorState::Stopped);
        assert!(!animator.tick(Instant::now(), &config()));
        assert!(animator.columns().is_empty());
    }

    #[test]
    fn test_lifecycle() {
        let mut animator = Animator::new(
            Some(Recorder::new(800.0)),
            &catalog(),
            StdRng::seed_from_u64(1),
        );
        assert_eq!(animator.state(), AnimatorState::Uninitialized);

        animator.resize(&config());
        assert_eq!(animator.state(), AnimatorState::Sized);

        animator.start(&config());
        assert_eq!(animator.state(), AnimatorState::Running);

        animator.set_hidden(true);
        assert_eq!(animator.state(), AnimatorState::Paused);
        assert!(!animator.is_scheduled());

        animator.set_hidden(false);
        assert_eq!(animator.state(), AnimatorState::Running);
    }

    #[test]
    fn test_column_count_scenario() {
        let config = AnimatorConfig {
            cell_size: 20.0,
            ..config()
        };
        let animator = running(800.0, StdRng::seed_from_u64(7), &config);

        assert_eq!(animator.columns().len(), 40);
        assert!(animator.columns().iter().all(|c| c.phrase.is_none()));
    }

    #[test]
    fn test_sizing_honors_minimum_width_and_columns() {
        let animator = running(100.0, StdRng::seed_from_u64(7), &config());
        assert_eq!(animator.columns().len(), 16);

        let huge = AnimatorConfig {
            cell_size: 400.0,
            ..config()
        };
        let animator = running(100.0, StdRng::seed_from_u64(7), &huge);
        assert_eq!(animator.columns().len(), 2);
    }

    #[test]
    fn test_sizing_applies_pixel_ratio() {
        let mut surface = Recorder::new(800.0);
        surface.ratio = 2.0;

        let config = AnimatorConfig {
            cell_size: 20.0,
            ..config()
        };
        let mut animator = Animator::new(Some(surface), &catalog(), StdRng::seed_from_u64(3));
        animator.start(&config);

        let surface = animator.surface().unwrap();
        assert_eq!(surface.size, (1600, 280));
        assert_eq!(surface.font, Some((40, "monospace".to_string())));
        assert_eq!(animator.columns().len(), 40);
    }

    #[test]
    fn test_start_draws_test_glyph() {
        let mut animator = Animator::new(
            Some(Recorder::new(800.0)),
            &catalog(),
            StdRng::seed_from_u64(3),
        );
        animator.start(&config());

        let ops = &animator.surface().unwrap().ops;
        assert_eq!(ops[0], Op::Clear);
        assert_eq!(
            ops[1],
            Op::Glyph {
                ch: 'あ',
                x: 10.0,
                y: 10.0,
                alpha: 1.0
            }
        );
    }

    #[test]
    fn test_drawing_failures_are_swallowed() {
        let mut surface = Recorder::new(800.0);
        surface.fail_glyphs = true;

        let config = AnimatorConfig {
            density: 1.0,
            ..config()
        };
        let mut animator = Animator::new(Some(surface), &catalog(), StdRng::seed_from_u64(3));
        animator.start(&config);
        assert_eq!(animator.state(), AnimatorState::Running);

        let now = Instant::now();
        for n in 0..10 {
            assert!(animator.tick(now + Duration::from_millis(n), &config));
        }
    }

    #[test]
    fn test_zero_density_only_fades() {
        let config = AnimatorConfig {
            density: 0.0,
            ..config()
        };
        let mut animator = running(800.0, StdRng::seed_from_u64(11), &config);

        let now = Instant::now();
        for n in 0..200 {
            animator.tick(now + Duration::from_millis(n), &config);
        }

        let surface = animator.surface().unwrap();
        assert_eq!(surface.ops.len(), 200);
        assert!(surface.ops.iter().all(|op| *op == Op::Fill(0.85)));
        assert!(animator.columns().iter().all(|c| c.phrase.is_none()));
    }

    #[test]
    fn test_frames_wait_for_interval() {
        let config = AnimatorConfig {
            interval: Duration::from_millis(120),
            ..AnimatorConfig::default()
        };
        let mut animator = running(800.0, StdRng::seed_from_u64(5), &config);

        let t0 = Instant::now();
        assert!(animator.tick(t0, &config));
        assert!(!animator.tick(t0 + Duration::from_millis(16), &config));
        assert!(!animator.tick(t0 + Duration::from_millis(119), &config));
        assert!(animator.tick(t0 + Duration::from_millis(120), &config));
        assert!(!animator.tick(t0 + Duration::from_millis(200), &config));
        assert!(animator.tick(t0 + Duration::from_millis(240), &config));
    }

    #[test]
    fn test_hidden_suppresses_frames_and_resume_draws_at_once() {
        let config = AnimatorConfig {
            interval: Duration::from_millis(120),
            ..AnimatorConfig::default()
        };
        let mut animator = running(800.0, StdRng::seed_from_u64(5), &config);

        let t0 = Instant::now();
        assert!(animator.tick(t0, &config));

        animator.set_hidden(true);
        assert!(!animator.tick(t0 + Duration::from_secs(5), &config));
        assert!(!animator.tick(t0 + Duration::from_secs(10), &config));

        animator.set_hidden(false);
        let resumed = t0 + Duration::from_secs(10) + Duration::from_millis(1);
        assert!(animator.tick(resumed, &config));
        assert!(!animator.tick(resumed + Duration::from_millis(16), &config));
    }

    #[test]
    fn test_idle_column_draws_nothing() {
        let config = AnimatorConfig {
            density: 0.5,
            ..config()
        };
        let mut animator = running(800.0, Scripted::constant(0.9), &config);

        // Column 0 spawns at head 0, every other column stays idle.
        animator.rng.queue.extend([0.1, 0.0]);
        assert!(animator.tick(Instant::now(), &config));

        let glyphs = animator.surface().unwrap().glyphs();
        assert!(!glyphs.is_empty());
        assert!(glyphs.iter().all(|&(_, x, _, _)| x == 0.0));
        assert_eq!(animator.columns()[0].phrase, Some(0));
        assert!(animator.columns()[1..].iter().all(|c| c.phrase.is_none()));
    }

    #[test]
    fn test_head_is_brightest() {
        let config = AnimatorConfig {
            density: 1.0,
            glyph_alpha: 0.8,
            speed: 1.0,
            ..config()
        };
        let mut animator = running(800.0, StdRng::seed_from_u64(21), &config);

        let now = Instant::now();
        for n in 0..30 {
            animator.surface_mut().unwrap().ops.clear();
            animator.tick(now + Duration::from_millis(n), &config);

            let glyphs = animator.surface().unwrap().glyphs();
            let mut xs: Vec<f64> = glyphs.iter().map(|g| g.1).collect();
            xs.dedup();

            for x in xs {
                let column: Vec<_> = glyphs.iter().filter(|g| g.1 == x).collect();
                let lowest = column
                    .iter()
                    .max_by(|a, b| a.2.total_cmp(&b.2))
                    .unwrap();
                assert!(column.iter().all(|g| lowest.3 >= g.3));
            }
        }
    }

    #[test]
    fn test_tail_is_dimmed() {
        let config = AnimatorConfig {
            density: 1.0,
            ..config()
        };
        let mut animator = running(800.0, Scripted::constant(0.0), &config);
        animator.tick(Instant::now(), &config);

        // Head at row 0: the head glyph and the one right above it are visible.
        let glyphs = animator.surface().unwrap().glyphs();
        let first: Vec<_> = glyphs.iter().filter(|g| g.1 == 0.0).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(*first[0], ('え', 0.0, -18.0, 0.55));
        assert_eq!(*first[1], ('お', 0.0, 0.0, 1.0));
    }

    fn exited_column(rng: Scripted) -> Animator<Recorder, Scripted> {
        let config = config();
        let mut animator = running(800.0, Scripted::constant(0.9), &config);
        animator.rng = rng;

        // Five glyphs of 18px on a 140px surface: the head must pass 230px.
        animator.columns[0] = Column {
            head: 13.0,
            phrase: Some(0),
        };
        animator
    }

    #[test]
    fn test_exited_phrase_deactivates_on_high_roll() {
        let config = AnimatorConfig {
            density: 0.0,
            ..config()
        };
        let mut animator = exited_column(Scripted::constant(0.9));
        animator.tick(Instant::now(), &config);

        assert_eq!(
            animator.columns()[0],
            Column {
                head: 0.0,
                phrase: None
            }
        );
    }

    #[test]
    fn test_exited_phrase_may_linger() {
        let config = AnimatorConfig {
            density: 0.0,
            ..config()
        };
        let mut animator = exited_column(Scripted::constant(0.5));
        animator.tick(Instant::now(), &config);

        let column = animator.columns()[0];
        assert_eq!(column.phrase, Some(0));
        assert!(column.head > 13.0);
    }

    #[test]
    fn test_visible_phrase_is_never_deactivated() {
        let config = AnimatorConfig {
            density: 0.0,
            ..config()
        };
        let mut animator = exited_column(Scripted::constant(0.99));
        animator.columns[0].head = 12.0;
        animator.tick(Instant::now(), &config);

        assert_eq!(animator.columns()[0].phrase, Some(0));
    }

    #[test]
    fn test_resize_resets_columns() {
        let config = AnimatorConfig {
            density: 1.0,
            ..config()
        };
        let mut animator = running(800.0, StdRng::seed_from_u64(2), &config);
        animator.tick(Instant::now(), &config);
        assert!(animator.columns().iter().all(|c| c.phrase.is_some()));

        animator.surface_mut().unwrap().client = (400.0, 140.0);
        animator.resize(&config);

        assert_eq!(animator.columns().len(), 22);
        assert!(animator.columns().iter().all(|c| c.phrase.is_none()));
        assert_eq!(animator.state(), AnimatorState::Running);
    }

    proptest! {
        #[test]
        fn prop_columns_keep_valid_phrase_and_forward_head(
            seed in any::<u64>(),
            density in 0.0f64..=1.0,
            speed in -2.0f64..3.0,
            frames in 1usize..120,
        ) {
            let mut vars = toml::Table::new();
            vars.insert("matrix-speed".into(), toml::Value::Float(speed));
            vars.insert("matrix-density".into(), toml::Value::Float(density));
            vars.insert("matrix-interval".into(), toml::Value::Integer(0));
            let config = AnimatorConfig::resolve(&StyleEnv::from(vars));
            let mut animator = running(640.0, StdRng::seed_from_u64(seed), &config);

            let now = Instant::now();
            for n in 0..frames {
                let before = animator.columns().to_vec();
                animator.tick(now + Duration::from_millis(n as u64), &config);

                for (prev, col) in before.iter().zip(animator.columns()) {
                    prop_assert!(col.phrase.is_none_or(|p| p < catalog().len()));
                    if prev.phrase.is_none() {
                        continue;
                    }
                    match col.phrase {
                        Some(p) => {
                            prop_assert_eq!(Some(p), prev.phrase);
                            prop_assert!(col.head >= prev.head);
                        }
                        None => prop_assert_eq!(col.head, 0.0),
                    }
                }
            }
        }
    }
}
