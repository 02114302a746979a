use crate::{
    error::{Error, Result},
    types::Rgb,
};

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tracing::{debug, warn};

pub const DEFAULT_CELL_SIZE: f64 = 18.0;
pub const MIN_CELL_SIZE: f64 = 8.0;
pub const MAX_CELL_SIZE: f64 = 256.0;
pub const DEFAULT_HEIGHT: f64 = 140.0;
pub const MAX_HEIGHT: f64 = 2048.0;
pub const DEFAULT_INTERVAL_MS: f64 = 120.0;
pub const MAX_INTERVAL_MS: f64 = 60_000.0;
pub const DEFAULT_SPEED: f64 = 0.04;
pub const DEFAULT_DENSITY: f64 = 0.15;
pub const DEFAULT_TRAIL_ALPHA: f64 = 0.85;
pub const DEFAULT_GLYPH_ALPHA: f64 = 1.0;
pub const DEFAULT_ACCENT: Rgb = Rgb(0x64, 0xff, 0xda);
pub const DEFAULT_FONT: &str = "monospace";

/// Named styling variables, optionally backed by a TOML file that is
/// re-read whenever its modification time changes.
#[derive(Debug, Default)]
pub struct StyleEnv {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
    vars: toml::Table,
}

impl From<toml::Table> for StyleEnv {
    fn from(vars: toml::Table) -> Self {
        Self {
            path: None,
            modified: None,
            vars,
        }
    }
}

impl StyleEnv {
    pub fn load(path: &Path) -> Result<Self> {
        let modified = modified_time(path);
        let vars = read_table(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            modified,
            vars,
        })
    }

    /// Reloads the backing file if it changed. Returns true when new values
    /// were picked up. A broken file keeps the previous values.
    pub fn poll(&mut self) -> bool {
        let Some(path) = self.path.clone() else {
            return false;
        };

        let modified = modified_time(&path);
        if modified.is_none() || modified == self.modified {
            return false;
        }
        self.modified = modified;

        match read_table(&path) {
            Ok(vars) => {
                debug!(path = %path.display(), "style variables reloaded");
                self.vars = vars;
                true
            }
            Err(e) => {
                warn!("keeping previous style variables: {}", e);
                false
            }
        }
    }

    /// Numeric variable; strings are read by their leading number, so
    /// `"18px"` yields 18.
    pub fn number(&self, name: &str) -> Option<f64> {
        let value = match self.vars.get(name)? {
            toml::Value::Integer(i) => *i as f64,
            toml::Value::Float(f) => *f,
            toml::Value::String(s) => leading_number(s)?,
            _ => return None,
        };

        value.is_finite().then_some(value)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.vars.get(name)? {
            toml::Value::String(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    content.parse::<toml::Table>().map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());

    (1..=end).rev().find_map(|len| s[..len].parse::<f64>().ok())
}

pub fn parse_color(s: &str) -> Option<Rgb> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

    match hex.len() {
        3 => {
            let r = channel(0..1)?;
            let g = channel(1..2)?;
            let b = channel(2..3)?;
            Some(Rgb(r * 17, g * 17, b * 17))
        }
        6 => Some(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        _ => None,
    }
}

/// Animator parameters as they stand for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatorConfig {
    /// Cell size in CSS pixels, before the pixel ratio is applied.
    pub cell_size: f64,
    /// Surface height in CSS pixels.
    pub height: f64,
    pub interval: Duration,
    /// Rows advanced per drawn frame.
    pub speed: f64,
    pub density: f64,
    pub trail_alpha: f32,
    pub glyph_alpha: f32,
    pub accent: Rgb,
    pub font_family: String,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self::resolve(&StyleEnv::default())
    }
}

impl AnimatorConfig {
    pub fn resolve(env: &StyleEnv) -> Self {
        let num = |name: &str, fallback: f64| env.number(name).unwrap_or(fallback);

        let accent = ["accent", "green"]
            .iter()
            .filter_map(|name| env.string(name))
            .find_map(parse_color)
            .unwrap_or(DEFAULT_ACCENT);

        Self {
            cell_size: num("matrix-char-size", DEFAULT_CELL_SIZE)
                .clamp(MIN_CELL_SIZE, MAX_CELL_SIZE),
            height: num("matrix-height", DEFAULT_HEIGHT).clamp(0.0, MAX_HEIGHT),
            interval: Duration::from_secs_f64(
                num("matrix-interval", DEFAULT_INTERVAL_MS).clamp(0.0, MAX_INTERVAL_MS) / 1000.0,
            ),
            speed: num("matrix-speed", DEFAULT_SPEED).max(0.0),
            density: num("matrix-density", DEFAULT_DENSITY).clamp(0.0, 1.0),
            trail_alpha: num("matrix-trail-alpha", DEFAULT_TRAIL_ALPHA).clamp(0.0, 1.0) as f32,
            glyph_alpha: num("matrix-char-alpha", DEFAULT_GLYPH_ALPHA).clamp(0.0, 1.0) as f32,
            accent,
            font_family: env.string("font-mono").unwrap_or(DEFAULT_FONT).to_string(),
        }
    }
}
