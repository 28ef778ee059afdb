//! Pipeline configuration
//!
//! All directory locations live in one [`PipelineConfig`] built at start-up
//! and handed to every component. Nothing reads paths from globals.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default root of the data tree when `SEEDLINE_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// File name of the source configuration document inside `<data>/config/`.
pub const SOURCE_CONFIG_FILE: &str = "source.config.json";

/// Directory and file locations for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source configuration document
    pub config_path: PathBuf,

    /// Raw fetch artifacts (`source-*`)
    pub raw_dir: PathBuf,

    /// Validated and anonymized artifacts (`processed-*`)
    pub processed_dir: PathBuf,

    /// Seed artifacts (`seed-*`)
    pub seeds_dir: PathBuf,

    /// Schema documents referenced by `schemaValidation.schemaFile`
    pub schema_dir: PathBuf,

    /// Metadata, lineage and validation reports
    pub metadata_dir: PathBuf,
}

impl PipelineConfig {
    /// Standard layout under a single data directory
    ///
    /// ```text
    /// <root>/config/source.config.json
    /// <root>/raw  <root>/processed  <root>/seeds  <root>/schema  <root>/metadata
    /// ```
    pub fn from_data_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_path: root.join("config").join(SOURCE_CONFIG_FILE),
            raw_dir: root.join("raw"),
            processed_dir: root.join("processed"),
            seeds_dir: root.join("seeds"),
            schema_dir: root.join("schema"),
            metadata_dir: root.join("metadata"),
        }
    }

    /// Load from environment variables (and `.env`, if present)
    ///
    /// - `SEEDLINE_DATA_DIR`: root of the data tree (default `./data`)
    /// - `SEEDLINE_CONFIG_PATH`: override for the source configuration file
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let root =
            std::env::var("SEEDLINE_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let config = Self::from_data_dir(root);

        match std::env::var("SEEDLINE_CONFIG_PATH") {
            Ok(path) => config.with_config_path(path),
            Err(_) => config,
        }
    }

    /// Point at a different source configuration file
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_data_dir(DEFAULT_DATA_DIR)
    }
}
