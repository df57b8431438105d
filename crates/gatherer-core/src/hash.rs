//! Canonical JSON and content hashing

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Serialize a value with sorted object keys and no whitespace.
///
/// Key order is rebuilt explicitly so the output does not depend on whether
/// `serde_json` was built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

/// Deep copy of `value` with every object's keys in sorted order
pub fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// SHA-256 hex digest of the canonical form of a (normalized) manifest
pub fn manifest_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_is_compact_and_sorted() {
        let value = json!({"b": 1, "a": {"d": [3, {"z": 1, "y": 2}], "c": null}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":null,"d":[3,{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_hash_ignores_key_order() {
        let a = json!({
            "metadata": {"name": "x", "labels": {"a": "1", "b": "2"}},
            "spec": {"replicas": 2}
        });
        let b: Value = serde_json::from_str(
            r#"{"spec":{"replicas":2},"metadata":{"labels":{"b":"2","a":"1"},"name":"x"}}"#,
        )
        .unwrap();
        assert_eq!(manifest_hash(&a), manifest_hash(&b));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = json!({"spec": {"replicas": 1}});
        let b = json!({"spec": {"replicas": 2}});
        assert_ne!(manifest_hash(&a), manifest_hash(&b));
        assert_eq!(manifest_hash(&a).len(), 64);
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = json!({"args": ["--a", "--b"]});
        let b = json!({"args": ["--b", "--a"]});
        assert_ne!(manifest_hash(&a), manifest_hash(&b));
    }
}
