//! Seed stage: processed artifact → seed artifact
//!
//! Seed records are the processed records plus a stable `seedId`
//! (`<sourceId>-<n>`, 1-based) and the batch generation instant.

use crate::artifact::{source_id_from_file_name, ArtifactKind, ArtifactWriter};
use crate::error::Result;
use crate::metadata::{Lineage, RunMetadata};
use chrono::{DateTime, Utc};
use seedline_common::types::iso_timestamp;
use seedline_common::Record;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attach seed identity to each record of a batch
pub fn to_seed_records(records: Vec<Record>, source_id: &str, generated_at: &DateTime<Utc>) -> Vec<Record> {
    let stamp = iso_timestamp(generated_at);
    records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            record.insert("seedId".to_string(), Value::String(format!("{}-{}", source_id, index + 1)));
            record.insert("seedGeneratedAt".to_string(), Value::String(stamp.clone()));
            record
        })
        .collect()
}

/// Seed artifact derived from one processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedArtifact {
    pub source_id: String,
    pub processed_file: String,
    pub seed_file: String,
    pub record_count: usize,
}

/// Where a processed artifact came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInput {
    pub source_id: String,
    pub processed_file: String,
    pub processed_at: Option<String>,
}

pub struct SeedStage<'a> {
    writer: &'a ArtifactWriter,
    run_id: Uuid,
}

impl<'a> SeedStage<'a> {
    pub fn new(writer: &'a ArtifactWriter, run_id: Uuid) -> Self {
        Self { writer, run_id }
    }

    /// Work out which source a processed file on disk belongs to.
    ///
    /// The processed metadata written alongside it is authoritative; file-name
    /// matching against configured ids is only used when it is missing.
    pub async fn resolve(&self, processed_file: &str, known_ids: &[&str]) -> Result<Option<SeedInput>> {
        if let Some(metadata) = self
            .writer
            .recorded_metadata(ArtifactKind::Processed, processed_file)
            .await?
        {
            debug!("Resolved {} to source {} via metadata", processed_file, metadata.source_id);
            return Ok(Some(SeedInput {
                source_id: metadata.source_id,
                processed_file: processed_file.to_string(),
                processed_at: Some(metadata.timestamp),
            }));
        }

        Ok(
            source_id_from_file_name(ArtifactKind::Processed, processed_file, known_ids).map(|source_id| {
                SeedInput {
                    source_id,
                    processed_file: processed_file.to_string(),
                    processed_at: None,
                }
            }),
        )
    }

    /// Seed every processed artifact found on disk
    pub async fn seed_all(&self, known_ids: &[&str]) -> Result<Vec<SeedArtifact>> {
        let processed_files = self.writer.discover_all(ArtifactKind::Processed).await?;
        if processed_files.is_empty() {
            info!("No processed data files found");
            return Ok(Vec::new());
        }

        info!("Found {} processed file(s)", processed_files.len());
        let mut seeds = Vec::with_capacity(processed_files.len());
        for file in &processed_files {
            match self.resolve(file, known_ids).await? {
                Some(input) => seeds.push(self.seed(&input).await?),
                None => warn!("Skipping {}: cannot tell which source it belongs to", file),
            }
        }
        Ok(seeds)
    }

    /// Generate one seed artifact and its metadata
    pub async fn seed(&self, input: &SeedInput) -> Result<SeedArtifact> {
        info!("Generating seed from {}", input.processed_file);

        let records: Vec<Record> = self
            .writer
            .read_json(ArtifactKind::Processed, &input.processed_file)
            .await?;

        let generated_at = Utc::now();
        let seed_records = to_seed_records(records, &input.source_id, &generated_at);
        let seed = self
            .writer
            .write(ArtifactKind::Seed, &input.source_id, None, &seed_records)
            .await?;

        let metadata = RunMetadata {
            source_id: input.source_id.clone(),
            timestamp: iso_timestamp(&seed.written_at),
            run_id: Some(self.run_id),
            record_count: seed_records.len(),
            seed_file: Some(seed.file_name.clone()),
            source_file: Some(input.processed_file.clone()),
            checksum: Some(seed.checksum.clone()),
            lineage: Some(Lineage {
                raw_file: None,
                processed_file: Some(input.processed_file.clone()),
                processed_at: input.processed_at.clone(),
            }),
            ..RunMetadata::default()
        };
        if let Err(e) = self
            .writer
            .write_companion(ArtifactKind::SeedMetadata, &input.source_id, None, &seed, &metadata)
            .await
        {
            self.writer.discard(&seed).await;
            return Err(e);
        }

        info!("Saved seed file {} ({} records)", seed.file_name, seed_records.len());

        Ok(SeedArtifact {
            source_id: input.source_id.clone(),
            processed_file: input.processed_file.clone(),
            seed_file: seed.file_name,
            record_count: seed_records.len(),
        })
    }
}
