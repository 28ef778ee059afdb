//! Error types for the ingest pipeline
//!
//! Per-page transport failures never surface here; the fetcher absorbs them
//! and stops pagination. Everything in [`IngestError`] is fatal for the run.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal pipeline errors
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source configuration is missing, unparseable, or fails validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A schema document referenced by a source could not be loaded
    #[error("Failed to load schema '{name}': {reason}")]
    Schema { name: String, reason: String },

    /// Filesystem operation failed
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file on disk does not contain the JSON we expect
    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint URL could not be built from the configuration
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An artifact name could not be allocated without overwriting
    #[error("Artifact name collision: {0}")]
    NameCollision(String),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a schema load error
    pub fn schema(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Schema {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a JSON parse error with the file it came from
    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
