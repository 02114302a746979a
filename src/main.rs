mod app;
mod config;
mod error;
mod helpers;
mod page;
mod rain;
mod surface;
mod types;

use crate::{
    app::App,
    config::StyleEnv,
    helpers::{default_phrases, load_phrases_from_file},
    page::Page,
    surface::CellSurface,
};

use anyhow::Context;
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        cursor::Show,
        event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const POLLING_RATE_MS: u64 = 16;
const IDLE_POLLING_RATE_MS: u64 = 250;

/// A terminal portfolio page with haiku falling through its footer.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Page text; `## Title` lines start sections
    #[arg(long, value_name = "PATH")]
    page: Option<PathBuf>,

    /// Phrases to drop, one per line
    #[arg(long, value_name = "PATH")]
    phrases: Option<PathBuf>,

    /// TOML file of style variables, re-read when it changes
    #[arg(long, value_name = "PATH")]
    style: Option<PathBuf>,

    /// Seed for a reproducible animation
    #[arg(long)]
    seed: Option<u64>,

    /// Device pixels per CSS pixel
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f64,

    /// Leave the footer empty
    #[arg(long)]
    no_rain: bool,

    /// Write logs to this file (filtered by RUST_LOG)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let catalog = match &args.phrases {
        Some(path) => load_phrases_from_file(path)?,
        None => default_phrases(),
    };
    let page = match &args.page {
        Some(path) => Page::load(path)?,
        None => Page::builtin(),
    };
    let style = match &args.style {
        Some(path) => StyleEnv::load(path)?,
        None => StyleEnv::default(),
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let surface = (!args.no_rain).then(|| CellSurface::new(args.pixel_ratio));

    enable_raw_mode()?;
    let _guard = TerminalGuard;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;

    info!(phrases = catalog.len(), sections = page.sections.len(), "starting");
    let mut app = App::new(
        page,
        &catalog,
        style,
        rng,
        surface,
        (size.width, size.height),
    );

    run(&mut terminal, &mut app)
}

/// Puts the terminal back on every way out of `main` once raw mode is on,
/// including `?` returns and panics.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen, Show);
    }
}

fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| app.draw_ui(frame))?;

        let timeout = if app.wants_frames() {
            POLLING_RATE_MS
        } else {
            IDLE_POLLING_RATE_MS
        };

        if event::poll(Duration::from_millis(timeout))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => break,
                    _ => app.handle_key(key),
                },
                Event::Resize(width, height) => app.resize(width, height),
                Event::FocusLost => app.set_focused(false),
                Event::FocusGained => app.set_focused(true),
                _ => {}
            }
        }

        app.on_frame(Instant::now());
    }

    info!("shutting down");

    Ok(())
}
