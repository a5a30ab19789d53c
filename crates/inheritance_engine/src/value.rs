//! Operations over dynamic configuration values.
//!
//! Parameter values are schema-less JSON data (`serde_json::Value`): leaf
//! scalars, arrays, or arbitrarily nested objects. This module provides the
//! explicit deep-merge, set, flattening, and shape operations the merge
//! engine is built on, so the rest of the crate never reaches for ad-hoc
//! structural juggling.
//!
//! Equality throughout is `serde_json::Value`'s structural equality, never
//! pointer identity.

use serde_json::{Map, Value};

/// Dynamic configuration value. Leaf scalar, array, or nested object.
pub type ParameterValue = Value;

/// Maximum nesting depth used when callers do not configure one.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Runtime type name of a value.
///
/// Used to classify conflicts where contributors disagree on the type of a
/// parameter rather than just its content.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep-merges `incoming` into `base` and returns the combined value.
///
/// Object-object collisions recurse per key with `incoming` winning on leaf
/// disagreement. Any other combination is replaced by `incoming` wholesale.
pub fn deep_merge(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (key, incoming_value) in incoming_map {
                let combined = match merged.get(key) {
                    Some(existing) => deep_merge(existing, incoming_value),
                    None => incoming_value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Shallow merge used by the per-parameter `merge` strategy.
///
/// Objects: key union, `incoming` wins per key without recursing. Arrays:
/// set union. Anything else: `incoming` replaces `base`.
pub fn shallow_merge(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (key, incoming_value) in incoming_map {
                merged.insert(key.clone(), incoming_value.clone());
            }
            Value::Object(merged)
        }
        (Value::Array(_), Value::Array(_)) => set_union(base, incoming),
        _ => incoming.clone(),
    }
}

/// Set union of two array values, preserving first-seen order.
///
/// Elements are deduplicated by structural equality. Non-array inputs are
/// treated as single-element sets.
pub fn set_union(a: &Value, b: &Value) -> Value {
    let mut union: Vec<Value> = Vec::new();
    for element in elements_of(a).iter().chain(elements_of(b).iter()) {
        if !union.contains(element) {
            union.push(element.clone());
        }
    }
    Value::Array(union)
}

/// Concatenation used by the `append` strategy.
///
/// Strings concatenate, arrays concatenate (existing first, then incoming,
/// duplicates kept). Mixed or non-appendable combinations fall back to the
/// incoming value.
pub fn append(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::String(existing), Value::String(added)) => {
            Value::String(format!("{existing}{added}"))
        }
        (Value::Array(existing), Value::Array(added)) => {
            let mut combined = existing.clone();
            combined.extend(added.iter().cloned());
            Value::Array(combined)
        }
        _ => incoming.clone(),
    }
}

/// Intersection used by the `intersect` strategy.
///
/// Objects keep only keys present in both sides, taking the incoming value.
/// Arrays keep only elements present in both, in the incoming ordering.
/// Other combinations yield the incoming value.
pub fn intersect(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut kept = Map::new();
            for (key, incoming_value) in incoming_map {
                if base_map.contains_key(key) {
                    kept.insert(key.clone(), incoming_value.clone());
                }
            }
            Value::Object(kept)
        }
        (Value::Array(base_items), Value::Array(incoming_items)) => Value::Array(
            incoming_items
                .iter()
                .filter(|item| base_items.contains(item))
                .cloned()
                .collect(),
        ),
        _ => incoming.clone(),
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]`, and `{}` are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numeric view of a value, if it has one.
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Flattens a nested value into dotted leaf paths.
///
/// `prefix` seeds the path (the parameter name the value was stored under).
/// Recursion stops at `max_depth`; branches cut off by the limit are
/// reported in the returned warning list and their subtree is emitted as a
/// single unexpanded value.
pub fn flatten_paths(
    prefix: &str,
    value: &Value,
    max_depth: usize,
) -> (Vec<(String, Value)>, Vec<String>) {
    let mut flattened = Vec::new();
    let mut warnings = Vec::new();
    flatten_into(prefix, value, max_depth, 0, &mut flattened, &mut warnings);
    (flattened, warnings)
}

fn flatten_into(
    path: &str,
    value: &Value,
    max_depth: usize,
    depth: usize,
    flattened: &mut Vec<(String, Value)>,
    warnings: &mut Vec<String>,
) {
    if let Value::Object(map) = value {
        if map.is_empty() {
            flattened.push((path.to_string(), value.clone()));
            return;
        }
        if depth >= max_depth {
            warnings.push(format!(
                "Maximum flattening depth {max_depth} reached at '{path}'; subtree left unexpanded"
            ));
            flattened.push((path.to_string(), value.clone()));
            return;
        }
        for (key, nested) in map {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            flatten_into(
                &child_path,
                nested,
                max_depth,
                depth + 1,
                flattened,
                warnings,
            );
        }
        return;
    }
    flattened.push((path.to_string(), value.clone()));
}

/// Structural shape of a value: every leaf replaced by its type name.
///
/// Objects map to objects of shapes (depth-capped), arrays to the string
/// `"array"`, scalars to their type names. Two configurations with equal
/// shapes are structurally compatible even when their leaf values differ.
pub fn shape_signature(value: &Value, max_depth: usize) -> Value {
    shape_at(value, max_depth, 0)
}

fn shape_at(value: &Value, max_depth: usize, depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if depth >= max_depth {
                return Value::String("object".to_string());
            }
            let mut shape = Map::new();
            for (key, nested) in map {
                shape.insert(key.clone(), shape_at(nested, max_depth, depth + 1));
            }
            Value::Object(shape)
        }
        other => Value::String(type_name(other).to_string()),
    }
}

fn elements_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
