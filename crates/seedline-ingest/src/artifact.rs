//! Artifact naming, writing and discovery
//!
//! Every file the pipeline produces is named
//! `<prefix>-<sourceId>[-<suffix>]-<timestamp>.json`, where the timestamp is
//! the millisecond UTC instant with `:` and `.` replaced by `-`. Files are
//! created with create-new semantics: an existing artifact is never
//! overwritten, a colliding name is re-derived a millisecond later.

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use crate::metadata::RunMetadata;
use chrono::{DateTime, Utc};
use seedline_common::fingerprint::sha256_hex;
use seedline_common::types::file_timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Tries at allocating a fresh name before giving up
const MAX_NAME_ATTEMPTS: u32 = 50;

/// Pause before re-deriving a colliding timestamp
const COLLISION_DELAY: Duration = Duration::from_millis(1);

/// Extension of every artifact
const ARTIFACT_EXT: &str = ".json";

/// Every kind of file the pipeline writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Raw,
    RawMetadata,
    Processed,
    ProcessedMetadata,
    ValidationReport,
    Seed,
    SeedMetadata,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Raw => "source",
            ArtifactKind::RawMetadata => "metadata",
            ArtifactKind::Processed => "processed",
            ArtifactKind::ProcessedMetadata => "processed-metadata",
            ArtifactKind::ValidationReport => "validation-errors",
            ArtifactKind::Seed => "seed",
            ArtifactKind::SeedMetadata => "seed-metadata",
        }
    }

    /// Kind of the metadata document written alongside a primary artifact
    pub fn metadata_kind(&self) -> Option<ArtifactKind> {
        match self {
            ArtifactKind::Raw => Some(ArtifactKind::RawMetadata),
            ArtifactKind::Processed => Some(ArtifactKind::ProcessedMetadata),
            ArtifactKind::Seed => Some(ArtifactKind::SeedMetadata),
            _ => None,
        }
    }

    pub fn directory<'a>(&self, config: &'a PipelineConfig) -> &'a Path {
        match self {
            ArtifactKind::Raw => &config.raw_dir,
            ArtifactKind::Processed => &config.processed_dir,
            ArtifactKind::Seed => &config.seeds_dir,
            ArtifactKind::RawMetadata
            | ArtifactKind::ProcessedMetadata
            | ArtifactKind::ValidationReport
            | ArtifactKind::SeedMetadata => &config.metadata_dir,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `<prefix>-<sourceId>[-<suffix>]-<timestamp>.json`
pub fn artifact_file_name(
    kind: ArtifactKind,
    source_id: &str,
    suffix: Option<&str>,
    instant: &DateTime<Utc>,
) -> String {
    let stamp = file_timestamp(instant);
    match suffix {
        Some(suffix) => format!("{}-{}-{}-{}{}", kind.prefix(), source_id, suffix, stamp, ARTIFACT_EXT),
        None => format!("{}-{}-{}{}", kind.prefix(), source_id, stamp, ARTIFACT_EXT),
    }
}

/// Name of the `companion` file sharing `file_name`'s source, suffix and
/// timestamp
pub fn companion_file_name(kind: ArtifactKind, companion: ArtifactKind, file_name: &str) -> String {
    match file_name.strip_prefix(kind.prefix()) {
        Some(rest) => format!("{}{}", companion.prefix(), rest),
        None => file_name.to_string(),
    }
}

/// Source id a file of `kind` belongs to.
///
/// The longest configured id whose `<prefix>-<id>-` matches wins, so `api-v2`
/// files never get attributed to `api`. Without a configured match the second
/// `-`-separated token is used.
pub fn source_id_from_file_name(kind: ArtifactKind, file_name: &str, known_ids: &[&str]) -> Option<String> {
    if let Some(id) = longest_matching_id(kind, file_name, known_ids) {
        return Some(id.to_string());
    }

    file_name
        .strip_prefix(kind.prefix())
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.split('-').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn longest_matching_id<'a>(kind: ArtifactKind, file_name: &str, known_ids: &[&'a str]) -> Option<&'a str> {
    known_ids
        .iter()
        .copied()
        .filter(|id| file_name.starts_with(&format!("{}-{}-", kind.prefix(), id)))
        .max_by_key(|id| id.len())
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub file_name: String,
    pub path: PathBuf,

    /// Instant encoded in the file name
    pub written_at: DateTime<Utc>,

    /// SHA-256 of the bytes written
    pub checksum: String,
}

/// Writes and finds artifacts under a [`PipelineConfig`] tree
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    config: PipelineConfig,
}

impl ArtifactWriter {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Path of an existing artifact
    pub fn path_of(&self, kind: ArtifactKind, file_name: &str) -> PathBuf {
        kind.directory(&self.config).join(file_name)
    }

    /// Write a primary artifact under a fresh, never-used name
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        kind: ArtifactKind,
        source_id: &str,
        suffix: Option<&str>,
        payload: &T,
    ) -> Result<WrittenArtifact> {
        let bytes = serde_json::to_vec_pretty(payload)?;
        let dir = kind.directory(&self.config);
        ensure_dir(dir).await?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let written_at = Utc::now();
            let file_name = artifact_file_name(kind, source_id, suffix, &written_at);
            let path = dir.join(&file_name);

            match create_new(&path, &bytes).await {
                Ok(()) => {
                    debug!("Wrote {} ({} bytes)", file_name, bytes.len());
                    return Ok(WrittenArtifact {
                        file_name,
                        path,
                        written_at,
                        checksum: sha256_hex(&bytes),
                    });
                },
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!("Artifact name {} taken (attempt {}), retrying", file_name, attempt);
                    tokio::time::sleep(COLLISION_DELAY).await;
                },
                Err(e) => return Err(IngestError::io(&path, e)),
            }
        }

        Err(IngestError::NameCollision(format!(
            "no free {} name for source '{}' after {} attempts",
            kind, source_id, MAX_NAME_ATTEMPTS
        )))
    }

    /// Write a companion file sharing `primary`'s timestamp
    ///
    /// The primary name was fresh, so a clash here means someone else wrote
    /// into our slot; that is reported rather than retried.
    pub async fn write_companion<T: Serialize + ?Sized>(
        &self,
        kind: ArtifactKind,
        source_id: &str,
        suffix: Option<&str>,
        primary: &WrittenArtifact,
        payload: &T,
    ) -> Result<WrittenArtifact> {
        let bytes = serde_json::to_vec_pretty(payload)?;
        let dir = kind.directory(&self.config);
        ensure_dir(dir).await?;

        let file_name = artifact_file_name(kind, source_id, suffix, &primary.written_at);
        let path = dir.join(&file_name);

        create_new(&path, &bytes).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                IngestError::NameCollision(file_name.clone())
            } else {
                IngestError::io(&path, e)
            }
        })?;
        debug!("Wrote {} ({} bytes)", file_name, bytes.len());

        Ok(WrittenArtifact {
            file_name,
            path,
            written_at: primary.written_at,
            checksum: sha256_hex(&bytes),
        })
    }

    /// Files of `kind` belonging to `source_id`, sorted by name
    ///
    /// Ownership is read from each file's metadata document. File-name
    /// matching is the fallback for files without one: `known_ids` are all
    /// configured source ids and a file also matching a longer id is left to
    /// that source. A missing directory yields nothing.
    pub async fn discover(&self, kind: ArtifactKind, source_id: &str, known_ids: &[&str]) -> Result<Vec<String>> {
        let prefix = format!("{}-{}-", kind.prefix(), source_id);

        let mut owned = Vec::new();
        for name in self.list(kind).await? {
            if !name.starts_with(&prefix) {
                continue;
            }
            let owner = match self.recorded_metadata(kind, &name).await? {
                Some(metadata) => Some(metadata.source_id),
                None => longest_matching_id(kind, &name, known_ids).map(str::to_string),
            };
            if owner.as_deref().map_or(true, |owner| owner == source_id) {
                owned.push(name);
            }
        }
        Ok(owned)
    }

    /// Metadata document written alongside `file_name`, if there is one
    pub async fn recorded_metadata(&self, kind: ArtifactKind, file_name: &str) -> Result<Option<RunMetadata>> {
        let Some(metadata_kind) = kind.metadata_kind() else {
            return Ok(None);
        };
        let metadata_file = companion_file_name(kind, metadata_kind, file_name);
        let path = self.path_of(metadata_kind, &metadata_file);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        if !exists {
            return Ok(None);
        }
        self.read_json(metadata_kind, &metadata_file).await.map(Some)
    }

    /// Remove an artifact left incomplete by a failed companion write
    pub async fn discard(&self, artifact: &WrittenArtifact) {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => warn!("Removed {} after a failed companion write", artifact.file_name),
            Err(e) => warn!("Failed to remove {} after a failed companion write: {}", artifact.file_name, e),
        }
    }

    /// Every `<prefix>-*.json` file of `kind`, sorted by name
    pub async fn discover_all(&self, kind: ArtifactKind) -> Result<Vec<String>> {
        self.list(kind).await
    }

    /// Deserialize an existing artifact
    pub async fn read_json<T: DeserializeOwned>(&self, kind: ArtifactKind, file_name: &str) -> Result<T> {
        let path = self.path_of(kind, file_name);
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        serde_json::from_slice(&content).map_err(|e| IngestError::json(&path, e))
    }

    async fn list(&self, kind: ArtifactKind) -> Result<Vec<String>> {
        let dir = kind.directory(&self.config);
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IngestError::io(dir, e)),
        };

        let prefix = format!("{}-", kind.prefix());
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| IngestError::io(dir, e))? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(ARTIFACT_EXT) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| IngestError::io(dir, e))
}

async fn create_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}
