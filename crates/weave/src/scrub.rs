//! Structural removal of a transient key from arbitrary JSON.

use serde_json::{Map, Value};

/// Returns a copy of `value` with every property named `key` removed, at any depth.
///
/// Absent input stays absent.
pub fn scrub(value: Option<&Value>, key: &str) -> Option<Value> {
    value.map(|value| scrub_value(value, key))
}

/// Returns a copy of `value` with every property named `key` removed, at any depth,
/// inside both objects and arrays. Scalars and `null` are returned unchanged.
pub fn scrub_value(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(scrub_object(map, key)),
        Value::Array(items) => Value::Array(items.iter().map(|item| scrub_value(item, key)).collect()),
        other => other.clone(),
    }
}

/// Object form of [`scrub_value`].
pub fn scrub_object(map: &Map<String, Value>, key: &str) -> Map<String, Value> {
    map.iter()
        .filter(|(name, _)| name.as_str() != key)
        .map(|(name, value)| (name.clone(), scrub_value(value, key)))
        .collect()
}
