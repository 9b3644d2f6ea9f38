//! KnowClaw error types

use thiserror::Error;

/// KnowClaw error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Language model capability error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge document error
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Record store error
    #[error("Record error: {0}")]
    Record(String),

    /// Gateway error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A bounded capability call ran out of time
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for KnowClaw operations
pub type Result<T> = std::result::Result<T, Error>;
