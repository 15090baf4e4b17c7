//! # Canonical JSON Bytes
//!
//! [`CanonicalBytes`] is the only input accepted by the digest functions.
//! Canonical form: object keys sorted lexicographically at every depth,
//! compact separators, UTF-8. Two values that serialize to equal JSON
//! documents always produce identical bytes regardless of field order.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical JSON serialization.
///
/// The inner `Vec<u8>` is private; construct through [`CanonicalBytes::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let sorted = sort_keys(value);
        Ok(Self(serde_json::to_vec(&sorted)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Rebuild every object with its keys in sorted order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted() {
        let value = serde_json::json!({"b": 1, "a": {"d": true, "c": null}});
        let cb = CanonicalBytes::new(&value).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn floats_are_preserved() {
        let cb = CanonicalBytes::new(&serde_json::json!({"amount": 1500.5})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"amount":1500.5}"#);
    }

    #[test]
    fn arrays_keep_order() {
        let cb = CanonicalBytes::new(&serde_json::json!([3, 1, 2])).unwrap();
        assert_eq!(cb.as_bytes(), b"[3,1,2]");
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct Forward {
            alpha: u8,
            beta: u8,
        }
        #[derive(Serialize)]
        struct Backward {
            beta: u8,
            alpha: u8,
        }
        let a = CanonicalBytes::new(&Forward { alpha: 1, beta: 2 }).unwrap();
        let b = CanonicalBytes::new(&Backward { beta: 2, alpha: 1 }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn into_bytes_matches_as_bytes() {
        let cb = CanonicalBytes::new(&serde_json::json!({"k": "v"})).unwrap();
        let copy = cb.as_bytes().to_vec();
        assert_eq!(cb.into_bytes(), copy);
    }
}
