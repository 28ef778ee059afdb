//! Seedline Ingest Library
//!
//! Configuration-driven ETL: pulls paginated records from REST sources,
//! validates and anonymizes them, and writes lineage-tracked seed artifacts.
//!
//! # Stages
//!
//! - **Fetch**: [`dispatch`] + [`fetch`] write raw artifacts per endpoint
//! - **Process**: [`process`] validates ([`schema`]) and anonymizes
//!   ([`anonymize`]) each raw artifact
//! - **Seed**: [`seed`] stamps processed records with seed ids
//!
//! Every artifact is written by [`artifact::ArtifactWriter`] together with a
//! [`metadata::RunMetadata`] document.
//!
//! # Example
//!
//! ```no_run
//! use seedline_ingest::{PipelineConfig, PipelineOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = PipelineOrchestrator::load(PipelineConfig::from_env()).await?;
//!     let summary = orchestrator.run().await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod anonymize;
pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod seed;
pub mod source;
pub mod transform;

pub use config::PipelineConfig;
pub use error::{IngestError, Result};
pub use pipeline::{CheckReport, PipelineOrchestrator, RunSummary};
pub use source::{SourceDescriptor, SourcesDocument};
