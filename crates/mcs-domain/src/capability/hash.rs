//! Definition hashing
//!
//! Canonical serialization and SHA-256 hashing of capability definitions.
//! Canonical form sorts object keys recursively so the hash is stable across
//! serializer map orderings.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of raw bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Render a JSON value in canonical form: object keys sorted recursively,
/// no insignificant whitespace, nulls retained.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys serialize through serde_json for correct escaping
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// SHA-256 over the canonical form of a definition value
pub fn definition_hash(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_form_sorts_keys_recursively() {
        let a = json!({"b": {"y": 1, "x": 2}, "a": [3, {"k": 1, "j": 2}]});
        assert_eq!(
            canonical_json(&a),
            r#"{"a":[3,{"j":2,"k":1}],"b":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn hash_is_order_insensitive() {
        let a = json!({"name": "echo", "kind": "tool"});
        let b = json!({"kind": "tool", "name": "echo"});
        assert_eq!(definition_hash(&a), definition_hash(&b));
    }

    #[test]
    fn hash_differs_on_content_change() {
        let a = json!({"name": "echo", "version": "1"});
        let b = json!({"name": "echo", "version": "2"});
        assert_ne!(definition_hash(&a), definition_hash(&b));
    }
}
