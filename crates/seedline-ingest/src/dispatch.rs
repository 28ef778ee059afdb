//! Fetch stage: route each source to its import branch
//!
//! Sources run in declaration order, one at a time. Only `REST_API` sources
//! transfer data; `FILE` and `MANUAL` sources are announced and left alone.

use crate::artifact::{ArtifactKind, ArtifactWriter};
use crate::error::Result;
use crate::fetch::PaginatedFetcher;
use crate::metadata::RunMetadata;
use crate::source::{RestConfig, SourceConfig, SourceDescriptor};
use seedline_common::types::iso_timestamp;
use tracing::{info, warn};
use uuid::Uuid;

/// Raw artifact written for one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedEndpoint {
    pub endpoint: String,
    pub raw_file: String,
    pub metadata_file: String,
    pub record_count: usize,
    pub pages_processed: u32,

    /// False when a page ran out of retries
    pub completed: bool,
}

/// What the fetch stage did with one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `enabled = false`
    Skipped,

    /// FILE or MANUAL import; nothing is transferred yet
    Placeholder,

    Fetched(Vec<FetchedEndpoint>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFetch {
    pub source_id: String,
    pub source_name: String,
    pub outcome: DispatchOutcome,
}

impl SourceFetch {
    pub fn record_count(&self) -> usize {
        match &self.outcome {
            DispatchOutcome::Fetched(endpoints) => endpoints.iter().map(|e| e.record_count).sum(),
            _ => 0,
        }
    }

    /// Raw artifacts written for this source
    pub fn raw_files(&self) -> Vec<&str> {
        match &self.outcome {
            DispatchOutcome::Fetched(endpoints) => endpoints.iter().map(|e| e.raw_file.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Drives the fetch stage for a list of sources
pub struct SourceDispatcher<'a> {
    writer: &'a ArtifactWriter,
    run_id: Uuid,
}

impl<'a> SourceDispatcher<'a> {
    pub fn new(writer: &'a ArtifactWriter, run_id: Uuid) -> Self {
        Self { writer, run_id }
    }

    /// Dispatch every source in order; the first failure aborts the stage
    pub async fn dispatch_all(&self, sources: &[SourceDescriptor]) -> Result<Vec<SourceFetch>> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            results.push(self.dispatch(source).await?);
        }
        Ok(results)
    }

    pub async fn dispatch(&self, source: &SourceDescriptor) -> Result<SourceFetch> {
        let outcome = if !source.enabled {
            info!("Skipping disabled source: {}", source.name);
            DispatchOutcome::Skipped
        } else {
            match &source.config {
                SourceConfig::Rest(rest) => {
                    info!("Fetching from REST API: {} ({})", source.name, source.id);
                    DispatchOutcome::Fetched(self.fetch_rest(source, rest).await?)
                },
                SourceConfig::File(file) => {
                    info!(
                        "File import for {}: expected at {}, file imports are not automated yet",
                        source.name, file.path
                    );
                    DispatchOutcome::Placeholder
                },
                SourceConfig::Manual(manual) => {
                    info!(
                        "Manual import for {}: target directory {}, manual imports are not automated yet",
                        source.name, manual.target_directory
                    );
                    DispatchOutcome::Placeholder
                },
            }
        };

        Ok(SourceFetch {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            outcome,
        })
    }

    async fn fetch_rest(&self, source: &SourceDescriptor, rest: &RestConfig) -> Result<Vec<FetchedEndpoint>> {
        let fetcher = PaginatedFetcher::new(rest)?;
        let mut fetched = Vec::with_capacity(rest.endpoints.len());

        for endpoint in &rest.endpoints {
            let report = fetcher.fetch_endpoint(endpoint).await?;
            if !report.completed {
                warn!(
                    "Source {} endpoint {} is incomplete: {} records from {} pages",
                    source.id,
                    endpoint.name,
                    report.records.len(),
                    report.pages_processed
                );
            }

            let raw = self
                .writer
                .write(ArtifactKind::Raw, &source.id, Some(&endpoint.name), &report.records)
                .await?;

            let metadata = RunMetadata {
                source_id: source.id.clone(),
                source_name: Some(source.name.clone()),
                source_type: Some(source.source_type.to_string()),
                endpoint: Some(endpoint.name.clone()),
                timestamp: iso_timestamp(&raw.written_at),
                run_id: Some(self.run_id),
                record_count: report.records.len(),
                pages_processed: Some(report.pages_processed),
                raw_data_file: Some(raw.file_name.clone()),
                checksum: Some(raw.checksum.clone()),
                ..RunMetadata::default()
            };
            let meta = match self
                .writer
                .write_companion(ArtifactKind::RawMetadata, &source.id, Some(&endpoint.name), &raw, &metadata)
                .await
            {
                Ok(meta) => meta,
                Err(e) => {
                    self.writer.discard(&raw).await;
                    return Err(e);
                },
            };

            info!("Saved {} records to {}", report.records.len(), raw.file_name);

            fetched.push(FetchedEndpoint {
                endpoint: endpoint.name.clone(),
                raw_file: raw.file_name,
                metadata_file: meta.file_name,
                record_count: report.records.len(),
                pages_processed: report.pages_processed,
                completed: report.completed,
            });
        }

        Ok(fetched)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::source::SourcesDocument;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_placeholders_and_disabled_sources_write_nothing() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(PipelineConfig::from_data_dir(dir.path()));
        let doc = SourcesDocument::parse(
            &json!({"sources": [
                {"id": "drop", "name": "Drop", "type": "FILE", "enabled": true, "config": {"path": "in.csv"}},
                {"id": "hand", "name": "Hand", "type": "MANUAL", "enabled": true, "config": {"targetDirectory": "m"}},
                {"id": "off", "name": "Off", "type": "REST_API", "enabled": false,
                 "config": {"baseUrl": "http://127.0.0.1:9", "endpoints": [{"name": "e", "path": "/e"}]}}
            ]})
            .to_string(),
        )
        .unwrap();

        let results = SourceDispatcher::new(&writer, Uuid::new_v4())
            .dispatch_all(&doc.sources)
            .await
            .unwrap();

        let outcomes: Vec<_> = results.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![DispatchOutcome::Placeholder, DispatchOutcome::Placeholder, DispatchOutcome::Skipped]
        );
        assert!(!dir.path().join("raw").exists());
        assert_eq!(results[0].record_count(), 0);
    }
}
