//! Stored value model.
//!
//! # Responsibility
//! - Define the closed set of shapes a stored value may take.
//! - Bridge to `serde_json` at the serialization boundary.
//!
//! # Invariants
//! - Numbers are always finite; `serde_json::Number` cannot hold NaN/inf.
//! - Object keys are unique and iterate in sorted order.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Mapping shape used for objects, subkey listings and full dumps.
pub type JsonMap = BTreeMap<String, JsonValue>;

/// JSON-compatible value persisted in `entries.value` and
/// `sub_entries.subvalue`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum JsonValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonMap),
}

impl JsonValue {
    /// Returns an empty object, the value of an auto-created parent entry.
    pub fn empty_object() -> Self {
        Self::Object(JsonMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsonMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) => value.as_i64(),
            _ => None,
        }
    }

    /// Looks up a field when this value is an object.
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|map| map.get(field))
    }

    /// JSON truthiness: `null`, `false`, zero, and empty strings, arrays
    /// or objects are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => value.as_f64().is_some_and(|number| number != 0.0),
            Self::String(value) => !value.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Object(map) => !map.is_empty(),
        }
    }
}

impl Display for JsonValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        serde_json::Value::from(self.clone()).fmt(f)
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(value) => Self::Number(value),
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for serde_json::Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(value) => Self::Number(value),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for JsonValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for JsonValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(value: Vec<JsonValue>) -> Self {
        Self::Array(value)
    }
}

impl From<JsonMap> for JsonValue {
    fn from(value: JsonMap) -> Self {
        Self::Object(value)
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for JsonValue {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonMap, JsonValue};
    use serde_json::json;

    #[test]
    fn converts_nested_serde_json_values() {
        let value = JsonValue::from(json!({"a": [1, "two", null], "b": {"c": true}}));

        let expected: JsonValue = [
            (
                "a",
                JsonValue::Array(vec![1.into(), "two".into(), JsonValue::Null]),
            ),
            ("b", [("c", JsonValue::Bool(true))].into_iter().collect()),
        ]
        .into_iter()
        .collect();
        assert_eq!(value, expected);
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(JsonValue::from(f64::NAN), JsonValue::Null);
        assert_eq!(JsonValue::from(f64::INFINITY), JsonValue::Null);
        assert_ne!(JsonValue::from(1.5), JsonValue::Null);
    }

    #[test]
    fn truthiness_follows_json_conventions() {
        assert!(!JsonValue::Null.is_truthy());
        assert!(!JsonValue::from(false).is_truthy());
        assert!(!JsonValue::from(0).is_truthy());
        assert!(!JsonValue::from(0.0).is_truthy());
        assert!(!JsonValue::from("").is_truthy());
        assert!(!JsonValue::Array(Vec::new()).is_truthy());
        assert!(!JsonValue::empty_object().is_truthy());

        assert!(JsonValue::from(true).is_truthy());
        assert!(JsonValue::from(-3).is_truthy());
        assert!(JsonValue::from("x").is_truthy());
        assert!(JsonValue::from(JsonMap::from([("k".to_string(), JsonValue::Null)])).is_truthy());
    }

    #[test]
    fn get_reads_object_fields_only() {
        let object = JsonValue::from(json!({"status": true}));
        assert_eq!(object.get("status"), Some(&JsonValue::Bool(true)));
        assert_eq!(object.get("missing"), None);
        assert_eq!(JsonValue::from(7).get("status"), None);
    }

    #[test]
    fn display_renders_compact_json() {
        let value = JsonValue::from(json!({"x": 1, "y": [true]}));
        assert_eq!(value.to_string(), r#"{"x":1,"y":[true]}"#);
    }
}
