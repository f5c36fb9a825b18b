//! Error types for drugwatch.
//!
//! Library crates use [`DrugwatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all drugwatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DrugwatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure while fetching a source page (connect, timeout, non-2xx).
    #[error("network error: {0}")]
    Network(String),

    /// The fetched HTML did not have the structure we scrape (no table, no body).
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (unknown enum names, malformed query values).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Scheduler construction or runtime error.
    #[error("schedule error: {0}")]
    Schedule(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DrugwatchError>;

impl DrugwatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
