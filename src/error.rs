use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("phrase file {} contains no phrases", .0.display())]
    EmptyCatalog(PathBuf),

    #[error("page file {} contains no sections", .0.display())]
    EmptyPage(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SurfaceError {
    #[error("glyph at ({x}, {y}) lies outside the surface")]
    OutOfBounds { x: f64, y: f64 },
}
