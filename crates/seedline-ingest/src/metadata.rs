//! Companion metadata for every artifact
//!
//! Each artifact gets exactly one metadata document naming it, the run that
//! produced it and, for processed and seed artifacts, the upstream file it
//! was derived from. Together they form the lineage audit trail.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upstream pointer of a derived artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
}

/// Metadata document written next to an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub source_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// ISO-8601 instant the artifact was written
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    pub record_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_processed: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,

    /// File the seed artifact was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// SHA-256 of the artifact bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
}
