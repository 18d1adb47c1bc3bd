//! Error types for botwire

use thiserror::Error;

/// botwire error type
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("No channel could be resolved from the message context")]
    NoChannel,

    #[error("Response has already been sent")]
    ResponseAlreadySent,

    #[error("Response receiver is closed")]
    ResponseClosed,

    #[error("Slack token not configured")]
    TokenNotConfigured,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for botwire
pub type Result<T> = std::result::Result<T, BotError>;
