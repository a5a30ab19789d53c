//! Tests for conflict records and severity assignment.

use super::*;
use serde_json::json;

fn contribution(id: &str, priority: u32, value: serde_json::Value) -> ConflictingValue {
    ConflictingValue {
        template_id: id.to_string(),
        priority,
        value,
    }
}

// ============================================================================
// Severity Rule
// ============================================================================

/// Verify the fixed kind-based severities.
#[test]
fn test_severity_fixed_kinds() {
    let values = vec![contribution("a", 9, json!(1)), contribution("b", 20, json!(2))];

    assert_eq!(
        severity_for(ConflictKind::Conditional, &values),
        ConflictSeverity::Critical
    );
    assert_eq!(
        severity_for(ConflictKind::Function, &values),
        ConflictSeverity::High
    );
    assert_eq!(
        severity_for(ConflictKind::Structure, &values),
        ConflictSeverity::Medium
    );
}

/// Verify value conflicts escalate to medium only past a 5-band spread.
#[test]
fn test_severity_priority_spread() {
    let narrow = vec![contribution("a", 9, json!(1)), contribution("b", 12, json!(2))];
    let wide = vec![contribution("a", 9, json!(1)), contribution("b", 20, json!(2))];

    assert_eq!(
        severity_for(ConflictKind::Value, &narrow),
        ConflictSeverity::Low
    );
    assert_eq!(
        severity_for(ConflictKind::Value, &wide),
        ConflictSeverity::Medium
    );
}

/// Verify severity ordering so reports can sort worst-first.
#[test]
fn test_severity_ordering() {
    assert!(ConflictSeverity::Critical > ConflictSeverity::High);
    assert!(ConflictSeverity::High > ConflictSeverity::Medium);
    assert!(ConflictSeverity::Medium > ConflictSeverity::Low);
}

// ============================================================================
// Conflict Construction
// ============================================================================

/// Verify conditional conflicts are flagged for manual intervention.
#[test]
fn test_conditional_requires_manual_intervention() {
    let conflict = Conflict::new(
        "cell.sleepMode",
        ConflictKind::Conditional,
        vec![contribution("a", 9, json!("x")), contribution("b", 20, json!("y"))],
    );

    assert!(conflict.requires_manual_intervention);
    assert_eq!(conflict.severity, ConflictSeverity::Critical);
    assert!(conflict.resolved_value.is_none());
}

/// Verify precedence accessors pick by numeric priority.
#[test]
fn test_precedence_accessors() {
    let conflict = Conflict::new(
        "p",
        ConflictKind::Value,
        vec![
            contribution("low-precedence", 40, json!(1)),
            contribution("high-precedence", 9, json!(2)),
        ],
    );

    assert_eq!(
        conflict.highest_precedence().map(|c| c.template_id.as_str()),
        Some("high-precedence")
    );
    assert_eq!(
        conflict.lowest_precedence().map(|c| c.template_id.as_str()),
        Some("low-precedence")
    );
    assert_eq!(conflict.template_ids(), vec!["low-precedence", "high-precedence"]);
}
