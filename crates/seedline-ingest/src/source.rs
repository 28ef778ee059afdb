//! Source configuration document (`source.config.json`)
//!
//! The document is checked in two passes. The first works on raw JSON and
//! reports which required key a source is missing. The second deserializes
//! into typed descriptors and checks cross-field rules (unique ids,
//! pagination bounds, rate limits).

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Keys every source entry must carry
const REQUIRED_SOURCE_KEYS: [&str; 5] = ["id", "type", "name", "enabled", "config"];

/// Kind of external provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    RestApi,
    File,
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::RestApi => "REST_API",
            SourceType::File => "FILE",
            SourceType::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination policy of a REST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    /// Query parameter carrying the 1-based page number
    pub page_param: String,

    /// Query parameter carrying the page size
    pub limit_param: String,

    /// Page size requested; a shorter page ends pagination
    pub default_limit: u32,

    /// Upper bound on pages fetched per endpoint
    pub max_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            limit_param: "limit".to_string(),
            default_limit: 100,
            max_pages: 1,
        }
    }
}

/// Request pacing and retry policy of a REST source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimit {
    pub requests_per_second: f64,

    /// Tries per page before pagination is abandoned
    pub retry_attempts: u32,

    /// Base backoff in milliseconds, multiplied by the attempt number
    pub retry_delay: u64,

    /// Per-request deadline in milliseconds
    pub request_timeout: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            retry_attempts: 3,
            retry_delay: 1000,
            request_timeout: 30_000,
        }
    }
}

/// One fetchable path of a REST source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub name: String,
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub pagination: Pagination,
}

fn default_method() -> String {
    "GET".to_string()
}

/// `config` block of a `REST_API` source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestConfig {
    pub base_url: String,
    pub endpoints: Vec<EndpointDescriptor>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub rate_limit: RateLimit,
}

/// `config` block of a `FILE` source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: String,
}

/// `config` block of a `MANUAL` source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualConfig {
    pub target_directory: String,
}

/// Type-specific source configuration
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Rest(RestConfig),
    File(FileConfig),
    Manual(ManualConfig),
}

/// `schemaValidation` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaValidation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schema_file: Option<String>,
}

/// `anonymization` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anonymization {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Source entry as written in the document, before the type-specific
/// `config` block is resolved
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    id: String,
    name: String,
    #[serde(rename = "type")]
    source_type: SourceType,
    enabled: bool,
    config: Value,
    #[serde(default)]
    schema_validation: SchemaValidation,
    #[serde(default)]
    anonymization: Anonymization,
}

/// A configured external data provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSource")]
pub struct SourceDescriptor {
    /// Join key for lineage; used verbatim in every artifact name
    pub id: String,
    pub name: String,
    pub source_type: SourceType,
    pub enabled: bool,
    pub config: SourceConfig,
    pub schema_validation: SchemaValidation,
    pub anonymization: Anonymization,
}

impl TryFrom<RawSource> for SourceDescriptor {
    type Error = String;

    fn try_from(raw: RawSource) -> std::result::Result<Self, Self::Error> {
        let config = match raw.source_type {
            SourceType::RestApi => serde_json::from_value(raw.config).map(SourceConfig::Rest),
            SourceType::File => serde_json::from_value(raw.config).map(SourceConfig::File),
            SourceType::Manual => serde_json::from_value(raw.config).map(SourceConfig::Manual),
        }
        .map_err(|e| format!("source '{}' has an invalid {} config: {}", raw.id, raw.source_type, e))?;

        Ok(Self {
            id: raw.id,
            name: raw.name,
            source_type: raw.source_type,
            enabled: raw.enabled,
            config,
            schema_validation: raw.schema_validation,
            anonymization: raw.anonymization,
        })
    }
}

impl SourceDescriptor {
    /// Schema file to validate against, when validation is switched on
    pub fn schema_file(&self) -> Option<&str> {
        if self.schema_validation.enabled {
            self.schema_validation.schema_file.as_deref()
        } else {
            None
        }
    }

    /// Fields to anonymize; empty when anonymization is off
    pub fn anonymized_fields(&self) -> &[String] {
        if self.anonymization.enabled {
            &self.anonymization.fields
        } else {
            &[]
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err(format!("source '{}' has an empty id", self.name));
        }

        if self.schema_validation.enabled && self.schema_validation.schema_file.is_none() {
            return Err(format!(
                "source '{}' enables schema validation without a schemaFile",
                self.id
            ));
        }

        if let SourceConfig::Rest(rest) = &self.config {
            if rest.base_url.trim().is_empty() {
                return Err(format!("source '{}' has an empty baseUrl", self.id));
            }
            if rest.endpoints.is_empty() {
                return Err(format!("source '{}' declares no endpoints", self.id));
            }
            let limits = &rest.rate_limit;
            if !(limits.requests_per_second > 0.0 && limits.requests_per_second.is_finite()) {
                return Err(format!("source '{}': requestsPerSecond must be > 0", self.id));
            }
            if limits.retry_attempts == 0 {
                return Err(format!("source '{}': retryAttempts must be >= 1", self.id));
            }
            if limits.request_timeout == 0 {
                return Err(format!("source '{}': requestTimeout must be > 0", self.id));
            }
            for endpoint in &rest.endpoints {
                if endpoint.name.trim().is_empty() {
                    return Err(format!("source '{}' has an endpoint without a name", self.id));
                }
                if endpoint.pagination.max_pages == 0 {
                    return Err(format!(
                        "source '{}', endpoint '{}': maxPages must be >= 1",
                        self.id, endpoint.name
                    ));
                }
                if endpoint.pagination.default_limit == 0 {
                    return Err(format!(
                        "source '{}', endpoint '{}': defaultLimit must be >= 1",
                        self.id, endpoint.name
                    ));
                }
                if reqwest::Method::from_bytes(endpoint.method.to_uppercase().as_bytes()).is_err() {
                    return Err(format!(
                        "source '{}', endpoint '{}': invalid method '{}'",
                        self.id, endpoint.name, endpoint.method
                    ));
                }
            }
        }

        Ok(())
    }
}

/// The whole configuration document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourcesDocument {
    pub sources: Vec<SourceDescriptor>,
}

impl SourcesDocument {
    /// Read and validate the document at `path`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            IngestError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a document from text
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| IngestError::config(format!("source config is not valid JSON: {}", e)))?;

        check_shape(&value)?;

        let document: SourcesDocument =
            serde_json::from_value(value).map_err(|e| IngestError::config(e.to_string()))?;

        let mut seen = HashSet::new();
        for source in &document.sources {
            source.validate().map_err(IngestError::Config)?;
            if !seen.insert(source.id.as_str()) {
                return Err(IngestError::config(format!("duplicate source id '{}'", source.id)));
            }
        }

        Ok(document)
    }

    /// Every configured source id, enabled or not
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id.as_str()).collect()
    }

    /// Look up a source by id
    pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Minimal structural check on the raw document
fn check_shape(value: &Value) -> Result<()> {
    let sources = value
        .get("sources")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::config("'sources' must be an array"))?;

    if sources.is_empty() {
        return Err(IngestError::config("'sources' must contain at least one source"));
    }

    for (index, source) in sources.iter().enumerate() {
        let object = source
            .as_object()
            .ok_or_else(|| IngestError::config(format!("source #{} is not an object", index)))?;

        if let Some(missing) = REQUIRED_SOURCE_KEYS.iter().find(|k| !object.contains_key(**k)) {
            return Err(IngestError::config(format!(
                "source #{} is missing required key '{}'",
                index, missing
            )));
        }
    }

    Ok(())
}
