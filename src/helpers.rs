use crate::error::{Error, Result};

use std::{fs, path::Path};

/// Ten classic haiku, each falling as a single stream.
pub const DEFAULT_PHRASES: [&str; 10] = [
    "古池や 蛙飛び込む 水の音",
    "春の海 ひねもすのたり のたりかな",
    "痩蛙 負けるな一茶 是にあり",
    "菜の花や 月は東に 日は西に",
    "閑けさや 岩にしみいる 蝉の声",
    "柿くへば 鐘が鳴るなり 法隆寺",
    "目には青葉 山ほとゝぎす はつ松魚",
    "降る雪や 明治は遠く なりにけり",
    "朝顔に 釣瓶とられて もらひ水",
    "梅一輪 一輪ほどの 暖かさ",
];

pub const DEFAULT_PAGE: &str = "\
## About
I build small, fast tools for the terminal and the web. Most of my work sits \
where systems programming meets interface design: parsers, renderers and the \
glue between them.

## Projects
haiku-rain: a falling-glyph footer for terminal portfolios.
glyphs: a font atlas packer that fits a CJK subset into a single texture.
tidepool: a log tailer that groups bursts of lines by their shape.

## Experience
Five years of backend work on streaming pipelines, followed by three years of \
building developer tooling. Comfortable owning a service end to end, from the \
wire format to the on-call rotation.

## Contact
Mail is the fastest way to reach me. I read everything and answer most of it \
within a week.
";

pub fn default_phrases() -> Vec<String> {
    DEFAULT_PHRASES.iter().map(|s| s.to_string()).collect()
}

pub fn read_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content.replace("\r\n", "\n"))
}

/// One phrase per line; blank lines are skipped.
pub fn load_phrases_from_file(path: &Path) -> Result<Vec<String>> {
    let phrases: Vec<String> = read_file(path)?
        .lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if phrases.is_empty() {
        return Err(Error::EmptyCatalog(path.to_path_buf()));
    }

    Ok(phrases)
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::new();

    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Greedy word wrap. Words longer than `width` are split across lines.
pub fn wrap_text(text: &str, width: u16) -> Vec<String> {
    let width = width.max(1) as usize;
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut col = 0usize;

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let word: Vec<char> = word.chars().collect();

            if col > 0 && col + 1 + word.len() > width {
                lines.push(std::mem::take(&mut line));
                col = 0;
            }

            if col > 0 {
                line.push(' ');
                col += 1;
            }

            for &ch in &word {
                if col == width {
                    lines.push(std::mem::take(&mut line));
                    col = 0;
                }
                line.push(ch);
                col += 1;
            }
        }

        lines.push(line);
    }

    lines
}
