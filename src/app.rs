use crate::{
    config::{AnimatorConfig, StyleEnv},
    page::{
        Document, HeaderOffset, Menu, NARROW_COLUMNS, Page, SmoothScroll, active_section,
        centered_scroll,
    },
    rain::Animator,
    surface::CellSurface,
    types::AnimatorState,
};

use rand::rngs::StdRng;
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent},
    prelude::*,
    widgets::*,
};
use std::{rc::Rc, time::Instant};
use tracing::{debug, info};

const HEADER_ROWS: u16 = 3;
const STATUS_ROWS: u16 = 1;

pub struct App {
    page: Page,
    style: StyleEnv,
    config: AnimatorConfig,
    animator: Animator<CellSurface, StdRng>,
    document: Document,
    header: HeaderOffset,
    menu: Menu,
    scroll: SmoothScroll,
    selected: usize,
    location: Option<String>,
    size: (u16, u16),
    content_rows: u16,
    focused: bool,
    user_paused: bool,
}

impl App {
    pub fn new(
        page: Page,
        catalog: &[String],
        style: StyleEnv,
        rng: StdRng,
        surface: Option<CellSurface>,
        size: (u16, u16),
    ) -> Self {
        let config = AnimatorConfig::resolve(&style);

        let mut app = Self {
            page,
            style,
            config,
            animator: Animator::new(surface, catalog, rng),
            document: Document::default(),
            header: HeaderOffset::default(),
            menu: Menu::default(),
            scroll: SmoothScroll::default(),
            selected: 0,
            location: None,
            size,
            content_rows: 0,
            focused: true,
            user_paused: false,
        };

        app.relayout();
        app.animator.start(&app.config);

        app
    }

    pub fn animator_state(&self) -> AnimatorState {
        self.animator.state()
    }

    pub fn header_offset(&self) -> u16 {
        self.header.get()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn scroll_position(&self) -> u16 {
        self.scroll.position()
    }

    /// Whether the host should call `on_frame` at display rate.
    pub fn wants_frames(&self) -> bool {
        self.animator.is_scheduled() || self.scroll.is_moving()
    }

    pub fn active_link(&self) -> Option<usize> {
        active_section(
            &self.document.tops(),
            self.scroll.position(),
            self.content_rows,
        )
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
        self.relayout();
        self.animator.resize(&self.config);
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.update_visibility();
    }

    pub fn on_frame(&mut self, now: Instant) {
        if self.style.poll() {
            info!("style variables reloaded");
        }

        let config = AnimatorConfig::resolve(&self.style);
        let geometry_changed = config.cell_size != self.config.cell_size
            || config.height != self.config.height
            || config.font_family != self.config.font_family;
        let accent_changed = config.accent != self.config.accent;
        self.config = config;

        if geometry_changed || accent_changed {
            self.relayout();
        }
        if geometry_changed {
            self.animator.resize(&self.config);
        }

        self.animator.tick(now, &self.config);
        self.scroll.step();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let count = self.page.sections.len();

        match key.code {
            KeyCode::Tab if count > 0 => {
                self.selected = (self.selected + 1) % count;
            }
            KeyCode::BackTab if count > 0 => {
                self.selected = (self.selected + count - 1) % count;
            }
            KeyCode::Enter => self.follow(self.selected),
            KeyCode::Char(c @ '1'..='9') => {
                self.follow(c as usize - '1' as usize);
            }
            KeyCode::Char('m') => self.toggle_menu(),
            KeyCode::Char('p') => {
                self.user_paused = !self.user_paused;
                self.update_visibility();
            }
            KeyCode::Down | KeyCode::Char('j') => self.scroll_by(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_by(-1),
            KeyCode::PageDown => self.scroll_by(self.page_rows()),
            KeyCode::PageUp => self.scroll_by(-self.page_rows()),
            KeyCode::Home => self.scroll.jump_to(0),
            KeyCode::End => self.scroll.jump_to(self.max_scroll()),
            _ => {}
        }
    }

    fn is_narrow(&self) -> bool {
        self.size.0 < NARROW_COLUMNS
    }

    fn header_rows(&self) -> u16 {
        if self.is_narrow() && self.menu.is_open() {
            HEADER_ROWS + self.page.sections.len() as u16
        } else {
            HEADER_ROWS
        }
    }

    fn footer_rows(&self) -> u16 {
        if self.animator.state() == AnimatorState::Stopped {
            return 0;
        }

        (self.config.height / self.config.cell_size).ceil() as u16
    }

    fn regions(&self, area: Rect) -> Rc<[Rect]> {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.header_rows()),  // Nav
                Constraint::Min(1),                      // Sections
                Constraint::Length(self.footer_rows()),  // Rain
                Constraint::Length(STATUS_ROWS),         // Status
            ])
            .split(area)
    }

    fn relayout(&mut self) {
        let chunks = self.regions(Rect::new(0, 0, self.size.0, self.size.1));

        if self.header.sync(chunks[0].height) {
            debug!(offset = self.header.get(), "header offset synced");
        }

        self.content_rows = chunks[1].height;
        self.document = self.page.layout(
            chunks[1].width.saturating_sub(2),
            self.config.accent.into(),
        );
        self.scroll.clamp(self.max_scroll());

        let footer = chunks[2];
        if let Some(surface) = self.animator.surface_mut() {
            surface.set_area(footer.width, footer.height, self.config.cell_size);
        }
    }

    fn update_visibility(&mut self) {
        self.animator.set_hidden(!self.focused || self.user_paused);
    }

    fn max_scroll(&self) -> u16 {
        self.document.max_scroll(self.content_rows)
    }

    fn page_rows(&self) -> i32 {
        self.content_rows.saturating_sub(1).max(1) as i32
    }

    fn scroll_by(&mut self, delta: i32) {
        let max = self.max_scroll() as i32;
        let position = (self.scroll.position() as i32 + delta).clamp(0, max);
        self.scroll.jump_to(position as u16);
    }

    fn toggle_menu(&mut self) {
        if !self.is_narrow() {
            return;
        }

        self.menu.toggle();
        debug!(expanded = self.menu.expanded_label(), "menu toggled");
        self.relayout();
    }

    fn follow(&mut self, index: usize) {
        let Some(id) = self.page.sections.get(index).map(|s| s.id.clone()) else {
            return;
        };

        if self.menu.is_open() {
            self.menu.close();
            self.relayout();
        }

        let Some(&extent) = self.document.spans.get(index) else {
            return;
        };

        let max = self.max_scroll();
        let scroll_to = centered_scroll(extent, self.size.1, self.header_offset(), max);
        self.scroll.glide_to(scroll_to);
        self.selected = index;
        self.location = Some(format!("#{}", id));

        debug!(scroll_to, location = %id, "following link");
    }

    fn link_style(&self, index: usize, active: Option<usize>) -> Style {
        let mut style = Style::default();
        if active == Some(index) {
            style = style
                .fg(self.config.accent.into())
                .add_modifier(Modifier::BOLD);
        }
        if self.selected == index {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        style
    }

    fn header_lines(&self) -> Vec<Line<'static>> {
        let active = self.active_link();

        if !self.is_narrow() {
            let spans: Vec<Span<'static>> = self
                .page
                .sections
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    Span::styled(
                        format!(" {} {} ", i + 1, s.title),
                        self.link_style(i, active),
                    )
                })
                .collect();

            return vec![Line::from(spans)];
        }

        let marker = if self.menu.is_open() { "▾" } else { "▸" };
        let mut lines = vec![Line::from(format!("{} menu (m)", marker))];

        if self.menu.is_open() {
            lines.extend(self.page.sections.iter().enumerate().map(|(i, s)| {
                Line::from(Span::styled(
                    format!(" {} {}", i + 1, s.title),
                    self.link_style(i, active),
                ))
            }));
        }

        lines
    }

    pub fn draw_ui(&self, f: &mut Frame) {
        let chunks = self.regions(f.area());

        let nav_block = Block::default().title(" portfolio ").borders(Borders::ALL);
        let nav = Paragraph::new(self.header_lines()).block(nav_block);
        f.render_widget(nav, chunks[0]);

        let content = Paragraph::new(self.document.lines.clone())
            .block(Block::default().padding(Padding::horizontal(1)))
            .scroll((self.scroll_position(), 0));
        f.render_widget(content, chunks[1]);

        if let Some(surface) = self.animator.surface() {
            f.render_widget(surface, chunks[2]);
        }

        let streams = self
            .animator
            .columns()
            .iter()
            .filter(|c| c.phrase.is_some())
            .count();
        let rain = match self.animator_state() {
            AnimatorState::Running => format!("running, {} streams", streams),
            AnimatorState::Paused => "paused".to_string(),
            AnimatorState::Stopped => "off".to_string(),
            AnimatorState::Uninitialized | AnimatorState::Sized => "starting".to_string(),
        };

        let status = format!(
            "{} | rain: {} | Tab/Enter follow · m menu · p pause · q quit",
            self.location().unwrap_or("#"),
            rain
        );
        f.render_widget(
            Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM)),
            chunks[3],
        );
    }
}
