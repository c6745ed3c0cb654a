//! Persisted record shapes.
//!
//! # Invariants
//! - `Entry.key` is unique across `entries`.
//! - `(SubEntry.parent_key, SubEntry.subkey)` is unique across `sub_entries`.
//! - A `SubEntry` never outlives the `Entry` named by `parent_key`.

use super::value::JsonValue;
use serde::{Deserialize, Serialize};

/// Key under which the completion marker is stored.
pub const DONE_KEY: &str = "done";

/// Top-level key/value record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: JsonValue,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every overwrite.
    pub updated_at: i64,
}

/// Value scoped under a parent entry key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEntry {
    pub parent_key: String,
    pub subkey: String,
    pub subvalue: JsonValue,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Conventional value stored under [`DONE_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneMarker {
    pub status: bool,
    pub name: String,
}

impl DoneMarker {
    pub fn new(status: bool, name: impl Into<String>) -> Self {
        Self {
            status,
            name: name.into(),
        }
    }

    pub fn to_value(&self) -> JsonValue {
        [
            ("status", JsonValue::Bool(self.status)),
            ("name", JsonValue::String(self.name.clone())),
        ]
        .into_iter()
        .collect()
    }

    /// Reads the completed project name out of a stored marker value.
    ///
    /// Returns `None` unless `status` is truthy and `name` is a string.
    /// Values written through [`crate::Store::add`] under [`DONE_KEY`] are
    /// read with the same loose rules.
    pub fn completed_name(value: &JsonValue) -> Option<String> {
        let done = value.get("status").is_some_and(JsonValue::is_truthy);
        if !done {
            return None;
        }
        value.get("name").and_then(JsonValue::as_str).map(str::to_string)
    }
}
