//! Execution payload.
//!
//! A payload is a JSON object that flows through the workflow. Each task's
//! output replaces it wholesale.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Key/value data carried by an execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

/// Payload could not be built from the given value
#[derive(Debug, Clone, Error)]
pub enum PayloadError {
    #[error("Payload must be a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },

    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),
}

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse a payload from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        Self::try_from(value)
    }

    /// Look up a value by path.
    ///
    /// Accepts `$`, `$.field` and `$.nested.field`. A bare `field` is also
    /// accepted and treated as `$.field`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let trimmed = path.strip_prefix('$').unwrap_or(path);
        let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);

        if trimmed.is_empty() {
            return None;
        }

        let mut segments = trimmed.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;

        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }

        Some(current)
    }

    /// Look up a string value by path (None for missing or non-string values)
    pub fn lookup_str(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a top-level field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Overlay another payload's fields on top of this one
    pub fn merge(&mut self, other: Payload) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized size in bytes
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(&self.0).map(|v| v.len()).unwrap_or(0)
    }

    /// Short content hash used to correlate history events with their input
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.0).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(&hasher.finalize()[..8])
    }
}

impl TryFrom<Value> for Payload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(PayloadError::NotAnObject { kind: "null" }),
            Value::Bool(_) => Err(PayloadError::NotAnObject { kind: "bool" }),
            Value::Number(_) => Err(PayloadError::NotAnObject { kind: "number" }),
            Value::String(_) => Err(PayloadError::NotAnObject { kind: "string" }),
            Value::Array(_) => Err(PayloadError::NotAnObject { kind: "array" }),
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        Payload::try_from(value).unwrap()
    }

    #[test]
    fn test_lookup_paths() {
        let p = payload(json!({
            "emotion": "NEGATIVE",
            "meta": { "source": { "id": 7 } }
        }));

        assert_eq!(p.lookup_str("$.emotion"), Some("NEGATIVE"));
        assert_eq!(p.lookup_str("emotion"), Some("NEGATIVE"));
        assert_eq!(p.lookup("$.meta.source.id"), Some(&json!(7)));
        assert!(p.lookup("$.meta.missing").is_none());
        assert!(p.lookup("$").is_none());
    }

    #[test]
    fn test_lookup_str_rejects_non_strings() {
        let p = payload(json!({ "emotion": 3 }));
        assert!(p.lookup("$.emotion").is_some());
        assert!(p.lookup_str("$.emotion").is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let result = Payload::from_json_str("[1, 2]");
        assert!(matches!(
            result,
            Err(PayloadError::NotAnObject { kind: "array" })
        ));
        assert!(matches!(
            Payload::from_json_str("{not json"),
            Err(PayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = payload(json!({ "age": "34", "text": "old" }));
        base.merge(payload(json!({ "text": "I hate this" })));

        assert_eq!(base.lookup_str("$.age"), Some("34"));
        assert_eq!(base.lookup_str("$.text"), Some("I hate this"));
    }

    #[test]
    fn test_digest_is_stable() {
        let a = payload(json!({ "age": "34" }));
        let b = payload(json!({ "age": "34" }));
        let c = payload(json!({ "age": "35" }));

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 16);
    }
}
