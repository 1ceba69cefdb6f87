//! Error types for the docset builder.
//!
//! Library crates use [`DocsetError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docset build operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsetError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the TOC, a page, or a resource.
    #[error("network error: {0}")]
    Network(String),

    /// TOC JSON or HTML structure did not have the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Headless page rendering failed.
    #[error("render error for {url}: {message}")]
    Render {
        url: String,
        message: String,
        /// Whether the failure looked like a dropped connection.
        transient: bool,
    },

    /// Search index (SQLite) error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Archive compression error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Data validation error (unsupported version, conflicting flags, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsetError>;

impl DocsetError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
