use crate::{
    config::DEFAULT_CELL_SIZE,
    error::SurfaceError,
    rain::Surface,
    types::{BACKGROUND, Rgb},
};

use ratatui::{prelude::*, widgets::Widget};

/// Terminal columns per glyph slot, wide enough for CJK glyphs.
pub const SLOT_WIDTH: u16 = 2;

/// Slots fainter than this are wiped by the next fade.
const VISIBLE_THRESHOLD: f32 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Slot {
    pub glyph: Option<char>,
    pub intensity: f32,
}

/// A `Surface` backed by a grid of terminal glyph slots. One slot covers one
/// font-sized square of device pixels.
#[derive(Debug)]
pub struct CellSurface {
    cols: u16,
    rows: u16,
    css_cell: f64,
    pixel_ratio: f64,
    width: u32,
    height: u32,
    font_px: u32,
    font_family: String,
    grid_width: usize,
    grid_height: usize,
    slots: Vec<Slot>,
    accent: Rgb,
    background: Rgb,
}

impl CellSurface {
    pub fn new(pixel_ratio: f64) -> Self {
        Self {
            cols: 0,
            rows: 0,
            css_cell: DEFAULT_CELL_SIZE,
            pixel_ratio,
            width: 0,
            height: 0,
            font_px: 0,
            font_family: String::new(),
            grid_width: 0,
            grid_height: 0,
            slots: Vec::new(),
            accent: Rgb(255, 255, 255),
            background: BACKGROUND,
        }
    }

    /// Records the terminal area the surface is laid out in, with one row
    /// standing for `css_cell` CSS pixels.
    pub fn set_area(&mut self, cols: u16, rows: u16, css_cell: f64) {
        self.cols = cols;
        self.rows = rows;
        self.css_cell = css_cell;
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.grid_width, self.grid_height)
    }

    pub fn slot(&self, col: usize, row: usize) -> Option<&Slot> {
        if col >= self.grid_width || row >= self.grid_height {
            return None;
        }
        self.slots.get(row * self.grid_width + col)
    }

    /// Rows past the laid-out area are never shown, so they are not kept.
    fn rebuild(&mut self) {
        let font = self.font_px.max(1);
        self.grid_width = self.width.div_ceil(font) as usize;
        self.grid_height = (self.height.div_ceil(font) as usize).min(self.rows as usize);
        self.slots = vec![Slot::default(); self.grid_width * self.grid_height];
    }

    fn slot_at(&mut self, x: f64, y: f64) -> Option<&mut Slot> {
        let font = self.font_px.max(1) as f64;
        let col = (x / font).round();
        let row = (y / font).round();

        if col < 0.0 || row < 0.0 {
            return None;
        }

        let (col, row) = (col as usize, row as usize);
        if col >= self.grid_width || row >= self.grid_height {
            return None;
        }

        self.slots.get_mut(row * self.grid_width + col)
    }
}

impl Surface for CellSurface {
    fn client_size(&self) -> (f64, f64) {
        let slots = (self.cols / SLOT_WIDTH) as f64;
        (slots * self.css_cell, self.rows as f64 * self.css_cell)
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rebuild();
    }

    fn set_font(&mut self, px: u32, family: &str) {
        self.font_family = family.to_string();
        if px != self.font_px {
            self.font_px = px;
            self.rebuild();
        }
    }

    fn clear(&mut self) {
        self.slots.fill(Slot::default());
    }

    fn fill(&mut self, color: Rgb, alpha: f32) {
        self.background = color;
        let keep = 1.0 - alpha.clamp(0.0, 1.0);

        for slot in &mut self.slots {
            slot.intensity *= keep;
            if slot.intensity < VISIBLE_THRESHOLD {
                *slot = Slot::default();
            }
        }
    }

    fn draw_glyph(
        &mut self,
        ch: char,
        x: f64,
        y: f64,
        color: Rgb,
        alpha: f32,
    ) -> Result<(), SurfaceError> {
        let alpha = alpha.clamp(0.0, 1.0);
        let slot = self
            .slot_at(x, y)
            .ok_or(SurfaceError::OutOfBounds { x, y })?;

        slot.glyph = Some(ch);
        slot.intensity = alpha + slot.intensity * (1.0 - alpha);
        self.accent = color;

        Ok(())
    }
}

impl Widget for &CellSurface {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let background = Color::from(self.background);
        buf.set_style(area, Style::default().bg(background));

        let visible_cols = (area.width / SLOT_WIDTH) as usize;
        let visible_rows = area.height as usize;

        let (grid_width, grid_height) = self.grid_size();

        for row in 0..grid_height.min(visible_rows) {
            for col in 0..grid_width.min(visible_cols) {
                let Some(slot) = self.slot(col, row) else {
                    continue;
                };
                let Some(ch) = slot.glyph else {
                    continue;
                };

                let fg = self.background.blend(self.accent, slot.intensity);
                buf.set_string(
                    area.x + col as u16 * SLOT_WIDTH,
                    area.y + row as u16,
                    ch.to_string(),
                    Style::default().fg(fg.into()).bg(background),
                );
            }
        }
    }
}
