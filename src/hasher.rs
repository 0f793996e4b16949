//! Deterministic content hashing
//!
//! Canonicalizes arbitrary JSON payloads (recursive key sort, strict number
//! handling) and digests the result with SHA-256. Pure functions only; the
//! same logical content hashes identically across calls and processes.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::{ContentHash, EngineError, Result};

/// Compute the content hash of a JSON payload
///
/// The payload is canonicalized first, so key order in the input never
/// affects the digest.
pub fn hash(payload: &Value) -> Result<ContentHash> {
    let canonical = canonical_json(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(ContentHash::from_bytes(hasher.finalize().into()))
}

/// Compute the SHA-256 digest of raw bytes as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value canonically: object keys sorted recursively,
/// no insignificant whitespace
///
/// Fails with `Encoding` on non-finite numbers. Cyclic references cannot be
/// expressed in `serde_json::Value`, so they are rejected upstream at
/// construction time.
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(EngineError::Encoding(
                        "non-finite number in content payload".to_string(),
                    ));
                }
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => {
            // serde_json string escaping is itself deterministic
            out.push_str(&serde_json::to_string(s).map_err(|e| {
                EngineError::Encoding(format!("string serialization failed: {}", e))
            })?);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).map_err(|e| {
                    EngineError::Encoding(format!("key serialization failed: {}", e))
                })?);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_deterministic() {
        let payload = json!({
            "id": "conte_001",
            "title": "Le lièvre et la hyène",
            "content": "Il était une fois...",
        });

        let first = hash(&payload).unwrap();
        let second = hash(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2, "nested": {"y": true, "x": false}});
        let b = json!({"nested": {"x": false, "y": true}, "a": 2, "b": 1});
        assert_eq!(hash(&a).unwrap(), hash(&b).unwrap());
    }

    #[test]
    fn test_any_byte_change_changes_hash() {
        let a = json!({"content": "Il était une fois..."});
        let b = json!({"content": "Il était une fois.."});
        assert_ne!(hash(&a).unwrap(), hash(&b).unwrap());
    }

    #[test]
    fn test_canonical_form_sorts_keys() {
        let value = json!({"z": 1, "a": [1, 2], "m": {"k": null}});
        let canonical = canonical_json(&value).unwrap();
        assert_eq!(canonical, r#"{"a":[1,2],"m":{"k":null},"z":1}"#);
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        // Matches the well-known digest of "Hello, World!"
        assert_eq!(
            sha256_hex(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_unicode_content_is_stable() {
        let payload = json!({"content": "Ní ọjọ́ kan..."});
        assert_eq!(hash(&payload).unwrap(), hash(&payload).unwrap());
    }
}
