//! Error types shared across Seedline crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, SeedlineError>;

/// Error type for the shared utilities
#[derive(Error, Debug)]
pub enum SeedlineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SeedlineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
