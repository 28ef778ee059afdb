//! Record validation against a declared schema
//!
//! A deliberately small rule engine: required fields, primitive type
//! categories and enum membership. Nested schemas are not followed.
//!
//! Violations come out in a fixed order (required fields first, then
//! properties in declaration order, type before enum) so reports are
//! reproducible between runs.

use crate::error::{IngestError, Result};
use crate::source::SourceDescriptor;
use seedline_common::types::value_kind;
use seedline_common::Record;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Type categories a property may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    /// Map a schema `type` keyword; anything outside the five categories is
    /// left unchecked
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(ValueType::String),
            "number" => Some(ValueType::Number),
            "boolean" => Some(ValueType::Boolean),
            "object" => Some(ValueType::Object),
            "array" => Some(ValueType::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }

    /// Null never counts as an object; arrays only match `array`
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Object => value.is_object(),
            ValueType::Array => value.is_array(),
        }
    }
}

/// Constraints declared for one property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRule {
    pub name: String,
    pub value_type: Option<ValueType>,
    pub allowed: Option<Vec<Value>>,
}

impl PropertyRule {
    fn from_json(name: &str, definition: &Value) -> Self {
        Self {
            name: name.to_string(),
            value_type: definition
                .get("type")
                .and_then(Value::as_str)
                .and_then(ValueType::from_keyword),
            allowed: definition.get("enum").and_then(Value::as_array).cloned(),
        }
    }
}

/// `{required, properties}` document; other keys (`$schema`, `title`, ...)
/// are ignored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDocument {
    pub required: Vec<String>,
    pub properties: Vec<PropertyRule>,
}

impl SchemaDocument {
    /// Build from a parsed JSON document
    pub fn from_json(document: &Value) -> Result<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| IngestError::schema("<inline>", "schema must be a JSON object"))?;

        let required = match object.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str().map(str::to_string).ok_or_else(|| {
                        IngestError::schema("<inline>", "'required' must list field names")
                    })
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(IngestError::schema("<inline>", "'required' must be an array")),
        };

        let properties = match object.get("properties") {
            None => Vec::new(),
            Some(Value::Object(props)) => props
                .iter()
                .map(|(name, definition)| PropertyRule::from_json(name, definition))
                .collect(),
            Some(_) => {
                return Err(IngestError::schema("<inline>", "'properties' must be an object"))
            },
        };

        Ok(Self { required, properties })
    }

    /// Load `<schema_dir>/<file_name>`
    pub async fn load(schema_dir: &Path, file_name: &str) -> Result<Self> {
        let path = schema_dir.join(file_name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| IngestError::schema(file_name, e))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| IngestError::schema(file_name, e))?;

        Self::from_json(&document).map_err(|e| match e {
            IngestError::Schema { reason, .. } => IngestError::schema(file_name, reason),
            other => other,
        })
    }

    /// Violations for `record`; empty means valid
    pub fn validate(&self, record: &Record) -> Vec<String> {
        validate(record, self)
    }
}

/// Schemas referenced by the configured sources, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, SchemaDocument>,
}

impl SchemaCatalog {
    /// Load every schema a source validates against, enabled or not.
    ///
    /// Any schema that fails to load aborts; validation is never silently
    /// skipped.
    pub async fn load_for<'a>(
        schema_dir: &Path,
        sources: impl IntoIterator<Item = &'a SourceDescriptor>,
    ) -> Result<Self> {
        let mut schemas = HashMap::new();
        for source in sources {
            let Some(file_name) = source.schema_file() else {
                continue;
            };
            if schemas.contains_key(file_name) {
                continue;
            }
            let schema = SchemaDocument::load(schema_dir, file_name).await?;
            info!(
                "Loaded schema {} ({} required, {} properties)",
                file_name,
                schema.required.len(),
                schema.properties.len()
            );
            schemas.insert(file_name.to_string(), schema);
        }
        Ok(Self { schemas })
    }

    pub fn get(&self, file_name: &str) -> Option<&SchemaDocument> {
        self.schemas.get(file_name)
    }

    /// Schema `source` validates against, if it has one
    pub fn for_source(&self, source: &SourceDescriptor) -> Result<Option<&SchemaDocument>> {
        match source.schema_file() {
            None => Ok(None),
            Some(file_name) => self
                .get(file_name)
                .map(Some)
                .ok_or_else(|| IngestError::schema(file_name, "schema was not loaded")),
        }
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, file_name: &str, schema: SchemaDocument) {
        self.schemas.insert(file_name.to_string(), schema);
    }
}

/// Check `record` against `schema`, returning one message per violation
pub fn validate(record: &Map<String, Value>, schema: &SchemaDocument) -> Vec<String> {
    let mut errors = Vec::new();

    for field in &schema.required {
        if !record.contains_key(field) {
            errors.push(format!("Missing required field: {}", field));
        }
    }

    for rule in &schema.properties {
        let Some(value) = record.get(&rule.name) else {
            continue;
        };

        if let Some(expected) = rule.value_type {
            if !expected.matches(value) {
                errors.push(format!(
                    "Field '{}' should be {}, got {}",
                    rule.name,
                    expected.as_str(),
                    value_kind(value)
                ));
            }
        }

        if let Some(allowed) = &rule.allowed {
            if !allowed.iter().any(|candidate| same_value(candidate, value)) {
                let listed: Vec<String> = allowed.iter().map(display_value).collect();
                errors.push(format!(
                    "Field '{}' value '{}' not in allowed values: {}",
                    rule.name,
                    display_value(value),
                    listed.join(", ")
                ));
            }
        }
    }

    errors
}

/// Equality where `1` and `1.0` are the same number
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Strings print bare, everything else as JSON text
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
