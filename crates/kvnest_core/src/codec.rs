//! Text codec for stored values.
//!
//! # Invariants
//! - `deserialize(Some(&serialize(v)?)) == v` for every value `serialize`
//!   accepts, floats included bit for bit.
//! - `serialize` rejects values nested deeper than `deserialize` can read.
//! - A SQL `NULL` column decodes to `JsonValue::Null`.

use crate::model::value::JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deepest array/object nesting serde_json's reader accepts.
pub const MAX_NESTING_DEPTH: usize = 127;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    TooDeep { limit: usize },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode value: {err}"),
            Self::Decode(err) => write!(f, "failed to decode stored value: {err}"),
            Self::TooDeep { limit } => {
                write!(f, "value nests deeper than {limit} arrays/objects")
            }
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::TooDeep { .. } => None,
        }
    }
}

/// Encodes a value as compact JSON text.
pub fn serialize(value: &JsonValue) -> CodecResult<String> {
    if exceeds_depth(value, MAX_NESTING_DEPTH) {
        return Err(CodecError::TooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Decodes stored JSON text; `None` is the SQL `NULL` marker.
pub fn deserialize(text: Option<&str>) -> CodecResult<JsonValue> {
    match text {
        None => Ok(JsonValue::Null),
        Some(text) => serde_json::from_str(text).map_err(CodecError::Decode),
    }
}

// Iterative so that absurdly deep input cannot overflow the stack here.
fn exceeds_depth(value: &JsonValue, limit: usize) -> bool {
    let mut pending = vec![(value, 0usize)];
    while let Some((value, depth)) = pending.pop() {
        match value {
            JsonValue::Array(items) => {
                if depth + 1 > limit {
                    return true;
                }
                pending.extend(items.iter().map(|item| (item, depth + 1)));
            }
            JsonValue::Object(map) => {
                if depth + 1 > limit {
                    return true;
                }
                pending.extend(map.values().map(|item| (item, depth + 1)));
            }
            _ => {}
        }
    }
    false
}
