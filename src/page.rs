use crate::{
    error::{Error, Result},
    helpers::{DEFAULT_PAGE, read_file, slugify, wrap_text},
};

use ratatui::prelude::*;
use std::path::Path;

/// Terminals narrower than this collapse the nav links behind a menu button.
pub const NARROW_COLUMNS: u16 = 60;

/// Fraction of the viewport a section top must cross to become active.
const SPY_THRESHOLD: f64 = 0.35;

#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub sections: Vec<Section>,
}

impl Page {
    /// `## Title` starts a section; anything before the first heading is
    /// dropped.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for line in text.lines() {
            if let Some(title) = line.strip_prefix("## ") {
                let title = title.trim().to_string();
                sections.push(Section {
                    id: slugify(&title),
                    title,
                    body: String::new(),
                });
                continue;
            }

            if let Some(section) = sections.last_mut() {
                if !section.body.is_empty() || !line.trim().is_empty() {
                    section.body.push_str(line);
                    section.body.push('\n');
                }
            }
        }

        for section in &mut sections {
            section.body = section.body.trim_end().to_string();
        }

        Self { sections }
    }

    pub fn builtin() -> Self {
        Self::parse(DEFAULT_PAGE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let page = Self::parse(&read_file(path)?);
        if page.sections.is_empty() {
            return Err(Error::EmptyPage(path.to_path_buf()));
        }

        Ok(page)
    }

    /// Lays the sections out for a content pane `width` columns wide.
    pub fn layout(&self, width: u16, accent: Color) -> Document {
        let mut lines = Vec::new();
        let mut spans = Vec::new();

        for section in &self.sections {
            let top = lines.len() as u16;

            lines.push(Line::from(Span::styled(
                section.title.clone(),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());
            lines.extend(wrap_text(&section.body, width).into_iter().map(Line::from));
            lines.push(Line::default());

            spans.push(Extent {
                top,
                height: lines.len() as u16 - top,
            });
        }

        Document { lines, spans }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub top: u16,
    pub height: u16,
}

/// A page rendered to lines, with the vertical extent of every section.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub lines: Vec<Line<'static>>,
    pub spans: Vec<Extent>,
}

impl Document {
    pub fn height(&self) -> u16 {
        self.lines.len() as u16
    }

    pub fn tops(&self) -> Vec<u16> {
        self.spans.iter().map(|s| s.top).collect()
    }

    pub fn max_scroll(&self, viewport: u16) -> u16 {
        self.height().saturating_sub(viewport)
    }
}

/// Header height as last measured from the rendered layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeaderOffset(u16);

impl HeaderOffset {
    pub fn get(self) -> u16 {
        self.0
    }

    /// Returns true when the height changed.
    pub fn sync(&mut self, measured: u16) -> bool {
        let changed = self.0 != measured;
        self.0 = measured;
        changed
    }
}

/// Scroll position that puts the middle of `target` in the middle of a
/// `viewport` rows tall window, shifted by the fixed header.
pub fn centered_scroll(
    target: Extent,
    viewport: u16,
    header_offset: u16,
    max_scroll: u16,
) -> u16 {
    let center = target.top as f64 + target.height as f64 / 2.0;
    let scroll = (center - viewport as f64 / 2.0 - header_offset as f64).round();

    scroll.clamp(0.0, max_scroll as f64) as u16
}

/// Index of the section being read: the last one whose top has crossed 35%
/// of the viewport. Falls back to the first section.
pub fn active_section(tops: &[u16], scroll: u16, viewport: u16) -> Option<usize> {
    if tops.is_empty() {
        return None;
    }

    let threshold = viewport as f64 * SPY_THRESHOLD;
    let current = tops
        .iter()
        .rposition(|&top| (top as f64 - scroll as f64) <= threshold)
        .unwrap_or(0);

    Some(current)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SmoothScroll {
    current: u16,
    target: u16,
}

impl SmoothScroll {
    pub fn position(self) -> u16 {
        self.current
    }

    pub fn is_moving(self) -> bool {
        self.current != self.target
    }

    pub fn glide_to(&mut self, target: u16) {
        self.target = target;
    }

    pub fn jump_to(&mut self, target: u16) {
        self.current = target;
        self.target = target;
    }

    pub fn clamp(&mut self, max: u16) {
        self.current = self.current.min(max);
        self.target = self.target.min(max);
    }

    /// Moves a quarter of the remaining distance, at least one row.
    pub fn step(&mut self) {
        let diff = self.target.abs_diff(self.current);
        if diff == 0 {
            return;
        }

        let delta = (diff / 4).max(1);
        if self.target > self.current {
            self.current += delta;
        } else {
            self.current -= delta;
        }
    }
}

/// Collapsible nav menu for narrow terminals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Menu {
    open: bool,
}

impl Menu {
    pub fn is_open(self) -> bool {
        self.open
    }

    /// Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn expanded_label(self) -> &'static str {
        if self.open { "true" } else { "false" }
    }
}
