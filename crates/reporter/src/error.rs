//! Error types for the report service client.

/// Errors produced while talking to the report service or persisting
/// unsent kills.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid key expiry {0:?}")]
    InvalidExpiry(String),

    #[error("no usable key")]
    NoKey,
}
