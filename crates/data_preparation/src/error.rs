//! src/error.rs
//!
//! Error taxonomy shared by every stage of the pipeline.
//!
//! Errors fall in two groups:
//! - **Per-sample** (`Format`, `Io`, `MissingMedia`, `Image`, `Download`, `Csv`): the
//!   run loops log them with the sample name, count them and move on.
//! - **Fatal** (`Discovery`, `Config`, `Yaml`): raised before any processing starts.
//!
//! Directory setup and dataset writing wrap their I/O failures in `Io` as well, but
//! the dataset engine propagates them instead of skipping.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No inputs discovered at {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    #[error("Malformed label ({location}): {message}")]
    Format { location: String, message: String },

    #[error("I/O failure at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media file not found: {0}")]
    MissingMedia(PathBuf),

    #[error("Image codec failure: {0}")]
    Image(#[from] image::ImageError),

    #[error("Download failed for {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("CSV failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("YAML failure: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps an `std::io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether a batch run may skip the offending sample and continue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Discovery { .. } | Self::Config(_) | Self::Yaml(_)
        )
    }
}
