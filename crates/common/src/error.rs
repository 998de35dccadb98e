use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A bar in the input stream violates the data contract. Fatal to the
    /// run for that instrument — silently skipping bars would corrupt every
    /// gap-based calculation downstream.
    #[error("malformed bar at index {index} ({timestamp}): {reason}")]
    MalformedBar {
        index: usize,
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// Contradictory or out-of-range configuration, rejected before any bar
    /// is processed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("exchange API error: {0}")]
    Exchange(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
