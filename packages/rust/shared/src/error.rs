//! Error types for GrantLens.
//!
//! Library crates use [`GrantLensError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all GrantLens operations.
#[derive(Debug, thiserror::Error)]
pub enum GrantLensError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The grants endpoint answered with a non-success status.
    #[error("request failed: HTTP {status} for {url}")]
    Request { status: u16, url: String },

    /// Transport-level failure (connect, timeout, body read, client build).
    #[error("network error: {0}")]
    Network(String),

    /// Malformed JSON or unexpected response shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The generative backend is not present in this environment.
    #[error("model backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend is present but creating a session failed.
    #[error("failed to create model session: {0}")]
    BackendCreate(String),

    /// Submitting a prompt to an existing session failed.
    #[error("model request failed: {0}")]
    BackendRequest(String),

    /// A caller-supplied context provider failed.
    #[error("context provider failed: {0}")]
    ContextProvider(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, out-of-range selection, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GrantLensError>;

impl GrantLensError {
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

    /// HTTP status carried by a [`GrantLensError::Request`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}
