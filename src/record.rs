//! Data records that rules are evaluated against

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Scalar value held by a data record or written as a condition literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Interpret a raw condition literal.
    ///
    /// Quoted literals are always text with the quotes stripped. Unquoted
    /// literals are numbers when they parse as a finite float, text otherwise,
    /// so `Infinity`, `inf` and `NaN` stay text and never compare against a
    /// numeric attribute.
    pub fn from_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(inner) = strip_quotes(raw) {
            return Scalar::Text(inner.to_string());
        }

        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Scalar::Number(n),
            _ => Scalar::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Number(_) => None,
        }
    }
}

fn strip_quotes(raw: &str) -> Option<&str> {
    if raw.len() < 2 {
        return None;
    }
    let bytes = raw.as_bytes();
    let (first, last) = (bytes[0], bytes[raw.len() - 1]);
    if (first == b'\'' || first == b'"') && first == last {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Caller-supplied mapping from attribute name to scalar value
///
/// The record is read-only during evaluation and never persisted by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRecord {
    values: HashMap<String, Scalar>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from a JSON object whose values are numbers or strings
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn get(&self, attribute: &str) -> Option<&Scalar> {
        self.values.get(attribute)
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Scalar>) {
        self.values.insert(attribute.into(), value.into());
    }

    /// Builder-style insert, handy when assembling records inline
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for DataRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleEngineError;

    #[test]
    fn test_literal_numbers() {
        assert_eq!(Scalar::from_literal("30"), Scalar::Number(30.0));
        assert_eq!(Scalar::from_literal("-3"), Scalar::Number(-3.0));
        assert_eq!(Scalar::from_literal("5.5"), Scalar::Number(5.5));
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(Scalar::from_literal("'Sales'"), Scalar::Text("Sales".into()));
        assert_eq!(Scalar::from_literal("\"Sales\""), Scalar::Text("Sales".into()));
        assert_eq!(Scalar::from_literal("Sales"), Scalar::Text("Sales".into()));
        // Quoted digits stay text
        assert_eq!(Scalar::from_literal("'30'"), Scalar::Text("30".into()));
        assert_eq!(Scalar::from_literal("''"), Scalar::Text(String::new()));
    }

    #[test]
    fn test_literal_non_finite_is_text() {
        assert_eq!(Scalar::from_literal("NaN"), Scalar::Text("NaN".into()));
        assert_eq!(Scalar::from_literal("inf"), Scalar::Text("inf".into()));
    }

    #[test]
    fn test_scalar_accessors() {
        let text = Scalar::from_literal("'Sales'");
        assert_eq!(text.as_text(), Some("Sales"));
        assert_eq!(text.as_number(), None);

        let number = Scalar::from_literal("5.5");
        assert_eq!(number.as_number(), Some(5.5));
        assert_eq!(number.as_text(), None);

        assert_eq!(Scalar::from_literal("Infinity").as_text(), Some("Infinity"));
    }

    #[test]
    fn test_mismatched_quotes_are_not_stripped() {
        assert_eq!(Scalar::from_literal("'abc\""), Scalar::Text("'abc\"".into()));
    }

    #[test]
    fn test_record_from_json() {
        let record = DataRecord::from_json(r#"{"age": 35, "department": "Sales"}"#).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("age"), Some(&Scalar::Number(35.0)));
        assert_eq!(record.get("department"), Some(&Scalar::Text("Sales".into())));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_record_rejects_non_scalar_values() {
        for json in [r#"{"a": true}"#, r#"{"a": null}"#, r#"{"a": [1]}"#, "[1, 2]"] {
            let err = DataRecord::from_json(json).unwrap_err();
            assert!(
                matches!(err, RuleEngineError::Deserialization(_)),
                "expected deserialization error for {}",
                json
            );
        }
    }

    #[test]
    fn test_record_from_iter() {
        let record: DataRecord = [("age", 10)].into_iter().collect();
        assert_eq!(record.get("age").and_then(Scalar::as_number), Some(10.0));
        assert!(!record.is_empty());
    }
}
