//! Process stage: raw artifact → processed artifact
//!
//! Each raw file is validated and anonymized on its own and produces exactly
//! one processed artifact, its metadata and, when anything was rejected, a
//! validation report sharing the same timestamp.

use crate::artifact::{ArtifactKind, ArtifactWriter, WrittenArtifact};
use crate::error::Result;
use crate::metadata::{Lineage, RunMetadata};
use crate::schema::SchemaCatalog;
use crate::source::SourceDescriptor;
use crate::transform::{RecordRejection, RecordTransformer};
use seedline_common::types::iso_timestamp;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

/// Processed artifact derived from one raw file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedArtifact {
    pub source_id: String,
    pub raw_file: String,
    pub processed_file: String,

    /// ISO-8601 instant the processed artifact was written
    pub processed_at: String,
    pub original_count: usize,
    pub processed_count: usize,
    pub error_count: usize,
    pub anonymized_count: usize,

    /// Written only when `error_count > 0`
    pub report_file: Option<String>,
}

pub struct ProcessStage<'a> {
    writer: &'a ArtifactWriter,
    schemas: &'a SchemaCatalog,
    run_id: Uuid,
}

impl<'a> ProcessStage<'a> {
    pub fn new(writer: &'a ArtifactWriter, schemas: &'a SchemaCatalog, run_id: Uuid) -> Self {
        Self { writer, schemas, run_id }
    }

    /// Process every raw artifact on disk that belongs to `source`
    pub async fn process_source(&self, source: &SourceDescriptor, known_ids: &[&str]) -> Result<Vec<ProcessedArtifact>> {
        let raw_files = self.writer.discover(ArtifactKind::Raw, &source.id, known_ids).await?;
        if raw_files.is_empty() {
            info!("No raw data files found for source: {}", source.id);
            return Ok(Vec::new());
        }

        info!("Found {} raw file(s) for {}", raw_files.len(), source.id);
        self.process_files(source, &raw_files).await
    }

    /// Process the named raw artifacts in order
    pub async fn process_files<S: AsRef<str>>(
        &self,
        source: &SourceDescriptor,
        raw_files: &[S],
    ) -> Result<Vec<ProcessedArtifact>> {
        let mut processed = Vec::with_capacity(raw_files.len());
        for raw_file in raw_files {
            if let Some(artifact) = self.process_file(source, raw_file.as_ref()).await? {
                processed.push(artifact);
            }
        }
        Ok(processed)
    }

    /// Returns `None` when the raw file does not hold a JSON array
    pub async fn process_file(&self, source: &SourceDescriptor, raw_file: &str) -> Result<Option<ProcessedArtifact>> {
        info!("Processing {}", raw_file);

        let raw: Value = self.writer.read_json(ArtifactKind::Raw, raw_file).await?;
        let Value::Array(records) = raw else {
            warn!("Skipping {}: raw data is not an array", raw_file);
            return Ok(None);
        };

        let schema = self.schemas.for_source(source)?;
        let transformer = RecordTransformer::new(schema, source.anonymized_fields());
        let outcome = transformer.transform(records);
        let original_count = outcome.input_len();

        for rejection in &outcome.rejected {
            if let Some(first) = rejection.errors.first() {
                warn!("Record {} validation failed: {}", rejection.record_index, first);
            }
        }

        let processed = self
            .writer
            .write(ArtifactKind::Processed, &source.id, None, &outcome.accepted)
            .await?;

        let processed_at = iso_timestamp(&processed.written_at);
        let metadata = RunMetadata {
            source_id: source.id.clone(),
            source_name: Some(source.name.clone()),
            source_type: Some(source.source_type.to_string()),
            timestamp: processed_at.clone(),
            run_id: Some(self.run_id),
            record_count: outcome.accepted.len(),
            original_count: Some(original_count),
            processed_count: Some(outcome.accepted.len()),
            error_count: Some(outcome.rejected.len()),
            processed_file: Some(processed.file_name.clone()),
            checksum: Some(processed.checksum.clone()),
            lineage: Some(Lineage {
                raw_file: Some(raw_file.to_string()),
                ..Lineage::default()
            }),
            ..RunMetadata::default()
        };

        let report_file = match self.write_companions(source, &processed, &metadata, &outcome.rejected).await {
            Ok(report_file) => report_file,
            Err(e) => {
                self.writer.discard(&processed).await;
                return Err(e);
            },
        };

        info!(
            "Saved {}: {} valid, {} invalid, {} anonymized",
            processed.file_name,
            outcome.accepted.len(),
            outcome.rejected.len(),
            outcome.anonymized
        );

        Ok(Some(ProcessedArtifact {
            source_id: source.id.clone(),
            raw_file: raw_file.to_string(),
            processed_file: processed.file_name,
            processed_at,
            original_count,
            processed_count: outcome.accepted.len(),
            error_count: outcome.rejected.len(),
            anonymized_count: outcome.anonymized,
            report_file,
        }))
    }

    /// Metadata and, when anything was rejected, the report. Either both
    /// land or neither does.
    async fn write_companions(
        &self,
        source: &SourceDescriptor,
        processed: &WrittenArtifact,
        metadata: &RunMetadata,
        rejected: &[RecordRejection],
    ) -> Result<Option<String>> {
        let metadata_file = self
            .writer
            .write_companion(ArtifactKind::ProcessedMetadata, &source.id, None, processed, metadata)
            .await?;

        if rejected.is_empty() {
            return Ok(None);
        }

        match self
            .writer
            .write_companion(ArtifactKind::ValidationReport, &source.id, None, processed, rejected)
            .await
        {
            Ok(report) => {
                warn!("{} invalid records, report saved to {}", rejected.len(), report.file_name);
                Ok(Some(report.file_name))
            },
            Err(e) => {
                self.writer.discard(&metadata_file).await;
                Err(e)
            },
        }
    }
}
