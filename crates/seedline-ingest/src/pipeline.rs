//! Pipeline orchestration
//!
//! [`PipelineOrchestrator`] loads the source configuration and every schema
//! it references up front, so configuration problems surface before any
//! network or filesystem work. Stages then run strictly in sequence: all
//! sources are fetched, then processed, then seeded.
//!
//! A full [`PipelineOrchestrator::run`] hands the exact artifact names each
//! stage produced to the next one. The standalone stage entry points instead
//! rediscover their inputs on disk.

use crate::artifact::ArtifactWriter;
use crate::config::PipelineConfig;
use crate::dispatch::{DispatchOutcome, SourceDispatcher, SourceFetch};
use crate::error::{IngestError, Result};
use crate::process::{ProcessStage, ProcessedArtifact};
use crate::schema::SchemaCatalog;
use crate::seed::{SeedArtifact, SeedInput, SeedStage};
use crate::source::SourcesDocument;
use std::fmt;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// What a pipeline invocation produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub fetched: Vec<SourceFetch>,
    pub processed: Vec<ProcessedArtifact>,
    pub seeds: Vec<SeedArtifact>,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            ..Self::default()
        }
    }

    /// Records rejected by validation across all processed artifacts
    pub fn total_errors(&self) -> usize {
        self.processed.iter().map(|p| p.error_count).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;

        if !self.fetched.is_empty() {
            writeln!(f, "Fetch:")?;
            for source in &self.fetched {
                match &source.outcome {
                    DispatchOutcome::Skipped => writeln!(f, "  {}: skipped (disabled)", source.source_id)?,
                    DispatchOutcome::Placeholder => {
                        writeln!(f, "  {}: no automated import", source.source_id)?
                    },
                    DispatchOutcome::Fetched(endpoints) => {
                        writeln!(f, "  {}: {} records", source.source_id, source.record_count())?;
                        for endpoint in endpoints {
                            let status = if endpoint.completed { "" } else { ", incomplete" };
                            writeln!(
                                f,
                                "    {}: {} records, {} pages{} -> {}",
                                endpoint.endpoint,
                                endpoint.record_count,
                                endpoint.pages_processed,
                                status,
                                endpoint.raw_file
                            )?;
                        }
                    },
                }
            }
        }

        if !self.processed.is_empty() {
            writeln!(f, "Process:")?;
            for artifact in &self.processed {
                writeln!(
                    f,
                    "  {}: original {}, processed {}, errors {} -> {}",
                    artifact.source_id,
                    artifact.original_count,
                    artifact.processed_count,
                    artifact.error_count,
                    artifact.processed_file
                )?;
            }
        }

        if !self.seeds.is_empty() {
            writeln!(f, "Seed:")?;
            for seed in &self.seeds {
                writeln!(f, "  {}: {} records -> {}", seed.source_id, seed.record_count, seed.seed_file)?;
            }
        }

        Ok(())
    }
}

/// Result of a configuration check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub sources: usize,
    pub enabled: usize,
    pub schemas: usize,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} source(s), {} enabled, {} schema(s) loaded",
            self.sources, self.enabled, self.schemas
        )
    }
}

/// Runs the fetch → process → seed pipeline over one data directory
pub struct PipelineOrchestrator {
    sources: SourcesDocument,
    schemas: SchemaCatalog,
    writer: ArtifactWriter,
    run_id: Uuid,
}

impl PipelineOrchestrator {
    /// Load configuration and schemas; fails before any stage runs
    pub async fn load(config: PipelineConfig) -> Result<Self> {
        let sources = SourcesDocument::load(&config.config_path).await?;
        info!(
            "Loaded {} source(s) from {}",
            sources.sources.len(),
            config.config_path.display()
        );

        let schemas = SchemaCatalog::load_for(&config.schema_dir, &sources.sources).await?;

        Ok(Self::new(config, sources, schemas))
    }

    pub fn new(config: PipelineConfig, sources: SourcesDocument, schemas: SchemaCatalog) -> Self {
        Self {
            sources,
            schemas,
            writer: ArtifactWriter::new(config),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn sources(&self) -> &SourcesDocument {
        &self.sources
    }

    /// Configuration and schemas were validated by [`Self::load`]
    pub fn check(&self) -> CheckReport {
        CheckReport {
            sources: self.sources.sources.len(),
            enabled: self.sources.sources.iter().filter(|s| s.enabled).count(),
            schemas: self.schemas.len(),
        }
    }

    /// All three stages, passing exact artifact names downstream
    pub async fn run(&self) -> Result<RunSummary> {
        let span = info_span!("pipeline", run_id = %self.run_id, stage = "run");
        async {
            let mut summary = RunSummary::new(self.run_id);

            summary.fetched = self.dispatcher().dispatch_all(&self.sources.sources).await?;

            let process = self.process_stage();
            for fetch in &summary.fetched {
                let raw_files = fetch.raw_files();
                if raw_files.is_empty() {
                    continue;
                }
                let source = self
                    .sources
                    .get(&fetch.source_id)
                    .ok_or_else(|| unknown_source(&fetch.source_id))?;
                summary.processed.extend(process.process_files(source, &raw_files).await?);
            }

            let seed = self.seed_stage();
            for artifact in &summary.processed {
                let input = SeedInput {
                    source_id: artifact.source_id.clone(),
                    processed_file: artifact.processed_file.clone(),
                    processed_at: Some(artifact.processed_at.clone()),
                };
                summary.seeds.push(seed.seed(&input).await?);
            }

            info!(
                "Pipeline finished: {} raw, {} processed, {} seed artifacts, {} validation errors",
                summary.fetched.iter().map(|f| f.raw_files().len()).sum::<usize>(),
                summary.processed.len(),
                summary.seeds.len(),
                summary.total_errors()
            );
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Fetch stage only
    pub async fn fetch(&self) -> Result<RunSummary> {
        let span = info_span!("pipeline", run_id = %self.run_id, stage = "fetch");
        async {
            let mut summary = RunSummary::new(self.run_id);
            summary.fetched = self.dispatcher().dispatch_all(&self.sources.sources).await?;
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Process stage only: every raw artifact of every enabled source
    pub async fn process(&self) -> Result<RunSummary> {
        let span = info_span!("pipeline", run_id = %self.run_id, stage = "process");
        async {
            let mut summary = RunSummary::new(self.run_id);
            let known_ids = self.sources.source_ids();
            let process = self.process_stage();

            for source in &self.sources.sources {
                if !source.enabled {
                    info!("Skipping disabled source: {}", source.name);
                    continue;
                }
                summary.processed.extend(process.process_source(source, &known_ids).await?);
            }
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Seed stage only: every processed artifact on disk
    pub async fn seed(&self) -> Result<RunSummary> {
        let span = info_span!("pipeline", run_id = %self.run_id, stage = "seed");
        async {
            let mut summary = RunSummary::new(self.run_id);
            let known_ids = self.sources.source_ids();
            summary.seeds = self.seed_stage().seed_all(&known_ids).await?;
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }

    fn dispatcher(&self) -> SourceDispatcher<'_> {
        SourceDispatcher::new(&self.writer, self.run_id)
    }

    fn process_stage(&self) -> ProcessStage<'_> {
        ProcessStage::new(&self.writer, &self.schemas, self.run_id)
    }

    fn seed_stage(&self) -> SeedStage<'_> {
        SeedStage::new(&self.writer, self.run_id)
    }
}

fn unknown_source(id: &str) -> IngestError {
    IngestError::config(format!("unknown source '{}'", id))
}
