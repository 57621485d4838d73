//! Error types for archlens.
//!
//! Two failure classes are fatal to an analysis run: bad input (missing root,
//! no matching files) and a broken language-server connection. Failures of a
//! single server query are not errors at this level; they are logged where
//! they happen and the affected artifact simply ends up with less data.

use thiserror::Error;

use crate::lsp::LspError;

/// Top-level error for an analysis run.
#[derive(Debug, Error)]
pub enum Error {
    /// Root path missing or unreadable, or no matching source files.
    #[error("Input error: {0}")]
    Input(String),

    /// The language server connection failed or produced malformed frames.
    #[error("Language server transport error: {0}")]
    Transport(String),

    /// The run was cancelled before it could finish.
    #[error("Analysis cancelled")]
    Cancelled,

    /// Metrics are written exactly once per run.
    #[error("Metrics have already been computed for this tree")]
    MetricsAlreadyComputed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn input<E: std::fmt::Display>(e: E) -> Self {
        Self::Input(e.to_string())
    }

    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<LspError> for Error {
    fn from(err: LspError) -> Self {
        match err {
            LspError::Transport(msg) => Error::Transport(msg),
            LspError::Cancelled => Error::Cancelled,
            other => Error::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
