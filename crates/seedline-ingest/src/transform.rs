//! Per-record validation + anonymization
//!
//! Records that fail validation are dropped whole and reported; accepted
//! records are anonymized after validation, never before.

use crate::anonymize::anonymize_record;
use crate::schema::SchemaDocument;
use seedline_common::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entry of a validation error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRejection {
    /// Position of the record in the input batch
    pub record_index: usize,
    pub errors: Vec<String>,
}

/// Partition of one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    pub accepted: Vec<Record>,
    pub rejected: Vec<RecordRejection>,
    /// Accepted records that went through anonymization
    pub anonymized: usize,
}

impl TransformOutcome {
    pub fn input_len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

/// Validation + anonymization for one source
#[derive(Debug, Clone, Copy)]
pub struct RecordTransformer<'a> {
    schema: Option<&'a SchemaDocument>,
    anonymized_fields: &'a [String],
}

impl<'a> RecordTransformer<'a> {
    /// `schema = None` accepts everything; an empty field list disables
    /// anonymization
    pub fn new(schema: Option<&'a SchemaDocument>, anonymized_fields: &'a [String]) -> Self {
        Self {
            schema,
            anonymized_fields,
        }
    }

    /// Partition a raw batch. Elements that are not JSON objects are rejected.
    pub fn transform(&self, records: Vec<Value>) -> TransformOutcome {
        let mut outcome = TransformOutcome::default();

        for (record_index, value) in records.into_iter().enumerate() {
            let Value::Object(record) = value else {
                outcome.rejected.push(RecordRejection {
                    record_index,
                    errors: vec!["Record is not an object".to_string()],
                });
                continue;
            };

            if let Some(schema) = self.schema {
                let errors = schema.validate(&record);
                if !errors.is_empty() {
                    outcome.rejected.push(RecordRejection {
                        record_index,
                        errors,
                    });
                    continue;
                }
            }

            if self.anonymized_fields.is_empty() {
                outcome.accepted.push(record);
            } else {
                outcome.accepted.push(anonymize_record(&record, self.anonymized_fields));
                outcome.anonymized += 1;
            }
        }

        outcome
    }
}
