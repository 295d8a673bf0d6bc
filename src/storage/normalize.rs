//! Record normalization for columnar output
//!
//! Parquet cannot represent a struct column with zero members, and nested
//! structures whose shape drifts between API responses make per-file schema
//! inference fragile. Every record is therefore flattened to scalar top-level
//! columns before it reaches the encoder:
//!
//! - `{"a": {}}` becomes `{"a": null}`
//! - `{"b": []}` becomes `{"b": null}`
//! - `{"c": {"x": 1}}` becomes `{"c_x": 1}` (recursively, `parent_child`)
//!
//! Non-empty arrays are left as arrays here; the encoder stores them as JSON
//! text.

use crate::storage::Record;
use serde_json::Value;

/// Normalizes a record for persistence
///
/// # Example
///
/// ```
/// use gh_harvest::storage::normalize_record;
/// use serde_json::json;
///
/// let record = json!({"a": {}, "b": [], "c": {"x": 1}});
/// let normalized = normalize_record(record.as_object().unwrap());
/// assert_eq!(serde_json::Value::Object(normalized), json!({"a": null, "b": null, "c_x": 1}));
/// ```
pub fn normalize_record(record: &Record) -> Record {
    let mut flattened = Record::new();
    for (key, value) in record {
        flatten_into(&mut flattened, key.clone(), value);
    }
    flattened
}

fn flatten_into(out: &mut Record, key: String, value: &Value) {
    match value {
        Value::Object(map) if map.is_empty() => {
            out.insert(key, Value::Null);
        }
        Value::Object(map) => {
            for (child, child_value) in map {
                flatten_into(out, format!("{}_{}", key, child), child_value);
            }
        }
        Value::Array(items) if items.is_empty() => {
            out.insert(key, Value::Null);
        }
        other => {
            out.insert(key, other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(value: Value) -> Value {
        Value::Object(normalize_record(value.as_object().unwrap()))
    }

    #[test]
    fn test_empty_structures_become_null() {
        let normalized = normalize(json!({"a": {}, "b": [], "c": {"x": 1}}));
        assert_eq!(normalized, json!({"a": null, "b": null, "c_x": 1}));
    }

    #[test]
    fn test_deep_nesting_flattens_recursively() {
        let normalized = normalize(json!({
            "name": "policy.yaml",
            "repository": {
                "full_name": "octo/mesh",
                "owner": {"login": "octo", "id": 7},
                "custom_properties": {}
            }
        }));

        assert_eq!(
            normalized,
            json!({
                "name": "policy.yaml",
                "repository_full_name": "octo/mesh",
                "repository_owner_login": "octo",
                "repository_owner_id": 7,
                "repository_custom_properties": null
            })
        );
    }

    #[test]
    fn test_non_empty_arrays_and_scalars_kept() {
        let normalized = normalize(json!({
            "topics": ["istio", "mesh"],
            "fork": false,
            "score": 1.5,
            "license": null
        }));

        assert_eq!(normalized["topics"], json!(["istio", "mesh"]));
        assert_eq!(normalized["fork"], json!(false));
        assert_eq!(normalized["score"], json!(1.5));
        assert_eq!(normalized["license"], Value::Null);
    }
}
