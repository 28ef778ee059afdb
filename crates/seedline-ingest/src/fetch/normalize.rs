//! Response body shapes
//!
//! Providers wrap their records differently. Accepted shapes are a top-level
//! array, or an object whose `data`, `records` or `results` key (first match
//! wins) holds an array. Anything else yields no records.

use serde_json::Value;

/// Envelope keys probed in order
pub const ENVELOPE_KEYS: [&str; 3] = ["data", "records", "results"];

/// Pull the record array out of a response body
pub fn extract_records(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut object) => {
            for key in ENVELOPE_KEYS {
                if matches!(object.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = object.remove(key) {
                        return items;
                    }
                }
            }
            Vec::new()
        },
        _ => Vec::new(),
    }
}
