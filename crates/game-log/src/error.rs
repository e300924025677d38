//! Error types for log tailing and line parsing.

use std::path::PathBuf;

/// Errors that stop the tailer from starting.
#[derive(Debug, thiserror::Error)]
pub enum GameLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("tailer already running")]
    AlreadyRunning,
}

/// Why a single line could not be turned into an event.
///
/// Always local to that line; the tailer logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected token {index}, line has {found}")]
    MissingToken { index: usize, found: usize },

    #[error("missing delimiter {0:?}")]
    MissingDelimiter(&'static str),

    #[error("malformed token: {0}")]
    Malformed(String),
}
