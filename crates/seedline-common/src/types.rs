//! Common types used across Seedline

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// A single schema-less record.
///
/// Field order is preserved from the source payload through every stage
/// (`serde_json` is built with `preserve_order`).
pub type Record = Map<String, Value>;

/// ISO-8601 instant with millisecond precision, e.g. `2024-01-15T10:30:00.123Z`
pub fn iso_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamp token embedded in artifact file names.
///
/// Same as [`iso_timestamp`] with `:` and `.` replaced by `-`, e.g.
/// `2024-01-15T10-30-00-123Z`.
pub fn file_timestamp(instant: &DateTime<Utc>) -> String {
    iso_timestamp(instant).replace([':', '.'], "-")
}

/// Category name of a JSON value as reported in validation messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
            + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_iso_timestamp_has_millis_and_z() {
        assert_eq!(iso_timestamp(&instant()), "2024-01-15T10:30:00.123Z");
    }

    #[test]
    fn test_file_timestamp_replaces_separators() {
        assert_eq!(file_timestamp(&instant()), "2024-01-15T10-30-00-123Z");
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind(&serde_json::json!(null)), "null");
        assert_eq!(value_kind(&serde_json::json!(1.5)), "number");
        assert_eq!(value_kind(&serde_json::json!([1])), "array");
        assert_eq!(value_kind(&serde_json::json!({"a": 1})), "object");
    }
}
