//! Tests for processing metrics.

use super::*;

/// Resolution counters split hits from misses.
#[test]
fn test_record_resolution() {
    let mut metrics = EngineMetrics::new();

    metrics.record_resolution("urban", 12, 2, false);
    metrics.record_resolution("urban", 0, 2, true);

    assert_eq!(metrics.templates_resolved, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.conflicts_detected, 4);

    let per_template = metrics.for_template("urban").unwrap();
    assert_eq!(per_template.resolutions, 2);
    assert_eq!(
        per_template.last_processing_time_ms, 12,
        "Cache hits do not overwrite the last measured time"
    );
}

/// Cache hit ratio is well-defined with no traffic.
#[test]
fn test_cache_hit_ratio() {
    let mut metrics = EngineMetrics::new();
    assert_eq!(metrics.cache_hit_ratio(), 0.0);

    metrics.record_resolution("a", 1, 0, false);
    metrics.record_resolution("a", 0, 0, true);

    assert!((metrics.cache_hit_ratio() - 0.5).abs() < f64::EPSILON);
}

/// Deleting a template drops its counters.
#[test]
fn test_forget_template() {
    let mut metrics = EngineMetrics::new();
    metrics.record_registration("base");
    assert!(metrics.for_template("base").is_some());

    metrics.forget_template("base");

    assert!(metrics.for_template("base").is_none());
    assert_eq!(metrics.templates_registered, 1, "Totals are not rewritten");
}
