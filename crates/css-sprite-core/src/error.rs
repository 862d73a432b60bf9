use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Packer could not place all slots ({placed}/{total} placed)")]
    OutOfSpace { placed: usize, total: usize },
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No stylesheet to process")]
    Empty,
}

impl SpriteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpriteError>;
