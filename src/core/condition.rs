//! Choice conditions.
//!
//! A condition is a predicate over the current payload. Choice states hold an
//! ordered list of `(condition, next)` rules and take the first that matches.

use serde::{Deserialize, Serialize};

use crate::domain::Payload;

/// A predicate over the payload
///
/// Choice rules hold a [`Condition`], so that definitions stay serializable.
/// New kinds of test are added as `Condition` variants; the trait is the
/// seam the orchestrator evaluates through.
pub trait Predicate: Send + Sync {
    fn evaluate(&self, payload: &Payload) -> bool;
}

/// Serializable conditions usable in workflow definitions
///
/// YAML forms:
/// - `string_equals: { variable: $.emotion, value: NEGATIVE }`
/// - `is_present: $.emotion`
/// - `not: <condition>`
/// - `and: [<condition>, ...]` / `or: [<condition>, ...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Field is a string exactly equal to `value` (case sensitive)
    StringEquals { variable: String, value: String },

    /// Field is a string not equal to `value`
    StringNotEquals { variable: String, value: String },

    /// Field exists (any type, including null)
    IsPresent(String),

    Not(Box<Condition>),

    And(Vec<Condition>),

    Or(Vec<Condition>),
}

impl Condition {
    pub fn string_equals(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StringEquals {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

impl Predicate for Condition {
    fn evaluate(&self, payload: &Payload) -> bool {
        match self {
            // Missing or non-string fields never match
            Self::StringEquals { variable, value } => {
                payload.lookup_str(variable) == Some(value.as_str())
            }
            Self::StringNotEquals { variable, value } => payload
                .lookup_str(variable)
                .map(|actual| actual != value)
                .unwrap_or(false),
            Self::IsPresent(variable) => payload.lookup(variable).is_some(),
            Self::Not(inner) => !inner.evaluate(payload),
            Self::And(items) => items.iter().all(|c| c.evaluate(payload)),
            Self::Or(items) => items.iter().any(|c| c.evaluate(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        Payload::try_from(value).unwrap()
    }

    fn is_negative() -> Condition {
        Condition::string_equals("$.emotion", "NEGATIVE")
    }

    #[test]
    fn test_string_equals_exact_match_only() {
        let cond = is_negative();

        assert!(cond.evaluate(&payload(json!({ "emotion": "NEGATIVE" }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "negative" }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "NEGATIVE " }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "" }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "POSITIVE" }))));
    }

    #[test]
    fn test_string_equals_malformed_input_is_false() {
        let cond = is_negative();

        assert!(!cond.evaluate(&payload(json!({}))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": null }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": 1 }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": ["NEGATIVE"] }))));
    }

    #[test]
    fn test_string_not_equals_requires_string() {
        let cond = Condition::StringNotEquals {
            variable: "$.emotion".to_string(),
            value: "NEGATIVE".to_string(),
        };

        assert!(cond.evaluate(&payload(json!({ "emotion": "POSITIVE" }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "NEGATIVE" }))));
        assert!(!cond.evaluate(&payload(json!({}))));
    }

    #[test]
    fn test_combinators() {
        let cond = Condition::And(vec![
            is_negative(),
            Condition::Not(Box::new(Condition::IsPresent("$.muted".to_string()))),
        ]);

        assert!(cond.evaluate(&payload(json!({ "emotion": "NEGATIVE" }))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "NEGATIVE", "muted": true }))));

        let either = Condition::Or(vec![
            is_negative(),
            Condition::string_equals("$.emotion", "MIXED"),
        ]);
        assert!(either.evaluate(&payload(json!({ "emotion": "MIXED" }))));
        assert!(!either.evaluate(&payload(json!({ "emotion": "NEUTRAL" }))));
    }

    #[test]
    fn test_yaml_forms() {
        let yaml = r#"
or:
  - string_equals:
      variable: $.emotion
      value: NEGATIVE
  - not:
      is_present: $.emotion
"#;
        let cond: Condition = serde_yaml::with::singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str(yaml),
        )
        .unwrap();

        assert_eq!(
            cond,
            Condition::Or(vec![
                is_negative(),
                Condition::Not(Box::new(Condition::IsPresent("$.emotion".to_string()))),
            ])
        );
        assert!(cond.evaluate(&payload(json!({}))));
        assert!(!cond.evaluate(&payload(json!({ "emotion": "POSITIVE" }))));
    }
}
