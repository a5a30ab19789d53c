//! Tests for dynamic value operations.

use super::*;
use serde_json::json;

// ============================================================================
// Deep Merge Tests
// ============================================================================

/// Verify object-object merges recurse per key with incoming winning.
#[test]
fn test_deep_merge_nested_objects() {
    let base = json!({"a": {"x": 1, "y": 2}, "b": 1});
    let incoming = json!({"a": {"y": 3, "z": 4}});

    let merged = deep_merge(&base, &incoming);

    assert_eq!(merged, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": 1}));
}

/// Verify scalar collisions are replaced by the incoming value.
#[test]
fn test_deep_merge_scalar_replaces() {
    assert_eq!(deep_merge(&json!(1), &json!("two")), json!("two"));
}

/// Verify shallow merge does not recurse into nested objects.
#[test]
fn test_shallow_merge_replaces_nested_wholesale() {
    let base = json!({"a": {"x": 1, "y": 2}});
    let incoming = json!({"a": {"z": 3}});

    assert_eq!(shallow_merge(&base, &incoming), json!({"a": {"z": 3}}));
}

// ============================================================================
// Set Operations
// ============================================================================

/// Verify array union deduplicates by structural equality, keeping first-seen order.
#[test]
fn test_set_union_deduplicates() {
    let union = set_union(&json!([1, 2]), &json!([2, 3]));
    assert_eq!(union, json!([1, 2, 3]));
}

/// Verify union is order-insensitive on content.
#[test]
fn test_set_union_either_order_same_content() {
    let forward = set_union(&json!([1, 2]), &json!([2, 3]));
    let backward = set_union(&json!([2, 3]), &json!([1, 2]));

    let mut forward_items = forward.as_array().unwrap().clone();
    let mut backward_items = backward.as_array().unwrap().clone();
    forward_items.sort_by_key(|v| v.as_i64());
    backward_items.sort_by_key(|v| v.as_i64());
    assert_eq!(forward_items, backward_items);
}

/// Verify append concatenates without deduplication.
#[test]
fn test_append_keeps_duplicates() {
    assert_eq!(append(&json!([1, 2]), &json!([2, 3])), json!([1, 2, 2, 3]));
    assert_eq!(append(&json!("ab"), &json!("cd")), json!("abcd"));
}

/// Verify object intersection keeps shared keys with the incoming value.
#[test]
fn test_intersect_objects() {
    let base = json!({"a": 1, "b": 2});
    let incoming = json!({"b": 9, "c": 3});

    assert_eq!(intersect(&base, &incoming), json!({"b": 9}));
}

/// Verify array intersection keeps only shared elements.
#[test]
fn test_intersect_arrays() {
    assert_eq!(intersect(&json!([1, 2, 3]), &json!([3, 4, 1])), json!([3, 1]));
}

// ============================================================================
// Flattening and Shape
// ============================================================================

/// Verify nested objects flatten into dotted paths.
#[test]
fn test_flatten_paths_dotted() {
    let value = json!({"radio": {"power": 43, "bands": [78]}});
    let (flattened, warnings) = flatten_paths("cell", &value, DEFAULT_MAX_DEPTH);

    assert!(warnings.is_empty());
    assert!(flattened.contains(&("cell.radio.power".to_string(), json!(43))));
    assert!(flattened.contains(&("cell.radio.bands".to_string(), json!([78]))));
}

/// Verify the depth limit cuts recursion with a warning instead of failing.
#[test]
fn test_flatten_paths_depth_limited() {
    let mut value = json!(1);
    for level in 0..12 {
        value = json!({ format!("l{level}"): value });
    }

    let (flattened, warnings) = flatten_paths("root", &value, DEFAULT_MAX_DEPTH);

    assert_eq!(warnings.len(), 1, "Over-deep branch should warn once");
    assert_eq!(flattened.len(), 1, "Cut branch emitted as a single value");
}

/// Verify shape signatures ignore leaf values but capture structure.
#[test]
fn test_shape_signature_ignores_leaf_values() {
    let first = shape_signature(&json!({"a": 1, "b": {"c": "x"}}), DEFAULT_MAX_DEPTH);
    let second = shape_signature(&json!({"a": 99, "b": {"c": "y"}}), DEFAULT_MAX_DEPTH);
    let different = shape_signature(&json!({"a": 1, "b": {"c": 2}}), DEFAULT_MAX_DEPTH);

    assert_eq!(first, second);
    assert_ne!(first, different, "Leaf type change alters the shape");
}

// ============================================================================
// Coercions
// ============================================================================

/// Verify JSON truthiness rules.
#[test]
fn test_truthy() {
    assert!(truthy(&json!(true)));
    assert!(truthy(&json!(1)));
    assert!(truthy(&json!("x")));
    assert!(!truthy(&json!(false)));
    assert!(!truthy(&json!(0)));
    assert!(!truthy(&json!("")));
    assert!(!truthy(&json!([])));
    assert!(!truthy(&json!({})));
    assert!(!truthy(&json!(null)));
}

/// Verify runtime type names used by conflict classification.
#[test]
fn test_type_name() {
    assert_eq!(type_name(&json!(null)), "null");
    assert_eq!(type_name(&json!(2.5)), "number");
    assert_eq!(type_name(&json!({"a": 1})), "object");
    assert_eq!(type_name(&json!([1])), "array");
}
