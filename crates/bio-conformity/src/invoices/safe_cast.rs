//! Defensive readers for loosely-typed JSON produced by external services.
//!
//! A field whose runtime type does not match the expected one reads as absent
//! (`None`, or an empty list) instead of being coerced.

use serde_json::{Map, Value};
use tracing::debug;

fn mismatch(key: &str, expected: &'static str, found: &Value) {
    debug!(field = key, expected, found = kind(found), "ignoring mistyped field");
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn safe_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Null => None,
        other => {
            mismatch(key, "string", other);
            None
        }
    }
}

pub fn safe_number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::Number(value) => value.as_f64().filter(|number| number.is_finite()),
        Value::Null => None,
        other => {
            mismatch(key, "number", other);
            None
        }
    }
}

pub fn safe_bool(object: &Map<String, Value>, key: &str) -> Option<bool> {
    match object.get(key)? {
        Value::Bool(value) => Some(*value),
        Value::Null => None,
        other => {
            mismatch(key, "bool", other);
            None
        }
    }
}

pub fn safe_array<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match object.get(key) {
        Some(Value::Array(values)) => values,
        Some(Value::Null) | None => &[],
        Some(other) => {
            mismatch(key, "array", other);
            &[]
        }
    }
}

pub fn safe_object<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Option<&'a Map<String, Value>> {
    match object.get(key)? {
        Value::Object(value) => Some(value),
        Value::Null => None,
        other => {
            mismatch(key, "object", other);
            None
        }
    }
}

/// List of strings; non-string entries are dropped.
pub fn safe_string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    safe_array(object, key)
        .iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect()
}

/// Number clamped to 0-100 and rounded, for conformity scores.
pub fn safe_score(object: &Map<String, Value>, key: &str) -> Option<u8> {
    safe_number(object, key).map(|score| score.round().clamp(0.0, 100.0) as u8)
}

/// Number clamped to 0-1, for confidences.
pub fn safe_ratio(object: &Map<String, Value>, key: &str) -> Option<f64> {
    safe_number(object, key).map(|ratio| ratio.clamp(0.0, 1.0))
}
