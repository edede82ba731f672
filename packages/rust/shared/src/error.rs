//! Error types for ClientIntel.
//!
//! Library crates use [`ClientIntelError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ClientIntel operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientIntelError {
    /// Configuration loading or validation error (including missing credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the search API.
    #[error("network error: {0}")]
    Network(String),

    /// Language model call or response error.
    #[error("model error: {0}")]
    Model(String),

    /// Input table could not be read.
    #[error("input error: {message}")]
    Input { message: String },

    /// Enriched table could not be written.
    #[error("output error: {message}")]
    Output { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, empty vocabulary, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClientIntelError>;

impl ClientIntelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input error from any displayable message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    /// Create an output error from any displayable message.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output {
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
