//! Tests for the engine façade.

use super::*;
use crate::events::EngineEventKind;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;

fn template(id: &str, priority: u32, parents: &[&str], config: serde_json::Value) -> Template {
    let mut template = Template::new(id, priority);
    template.inherits_from = parents.iter().map(|p| p.to_string()).collect();
    if let serde_json::Value::Object(map) = config {
        for (key, value) in map {
            template.configuration.insert(key, value);
        }
    }
    template
}

/// Publisher capturing every event for assertions.
struct RecordingPublisher {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingPublisher {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn kinds(&self) -> Vec<EngineEventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn engine_with_recorder() -> (PriorityTemplateEngine, Arc<RecordingPublisher>) {
    let recorder = Arc::new(RecordingPublisher::new());
    let engine = PriorityTemplateEngine::new(
        Arc::new(BasicTemplateValidator::new()),
        recorder.clone(),
        EngineOptions::default(),
    );
    (engine, recorder)
}

// ============================================================================
// Registration
// ============================================================================

/// Valid templates register and emit an event.
#[tokio::test]
async fn test_register_template() {
    let (mut engine, recorder) = engine_with_recorder();

    let report = engine
        .register_template(template("base", 9, &[], json!({"a": 1})))
        .await
        .unwrap();

    assert!(report.is_valid());
    assert_eq!(engine.template_count(), 1);
    assert_eq!(recorder.kinds(), vec![EngineEventKind::TemplateRegistered]);
}

/// Invalid templates are rejected and never stored.
#[tokio::test]
async fn test_register_invalid_template_not_stored() {
    let (mut engine, recorder) = engine_with_recorder();
    let bad = template("selfish", 9, &["selfish"], json!({"a": 1}));

    let error = engine.register_template(bad).await.unwrap_err();

    assert!(matches!(error, EngineError::Validation { .. }));
    assert_eq!(engine.template_count(), 0);
    assert_eq!(recorder.kinds(), vec![EngineEventKind::ValidationFailed]);
}

/// Re-registration overwrites the stored record.
#[tokio::test]
async fn test_reregistration_overwrites() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1})))
        .await
        .unwrap();
    engine
        .register_template(template("base", 9, &[], json!({"a": 2})))
        .await
        .unwrap();

    assert_eq!(engine.template_count(), 1);
    assert_eq!(
        engine.get_template("base").unwrap().configuration["a"],
        json!(2)
    );
}

// ============================================================================
// Resolution and Caching
// ============================================================================

/// Resolving twice with identical options serves the second request from
/// cache and returns an identical result; clearing the cache still yields
/// a value-equal result.
#[tokio::test]
async fn test_resolution_idempotence() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1, "b": 2})))
        .await
        .unwrap();
    engine
        .register_template(template("urban", 20, &["base"], json!({"b": 3, "c": 4})))
        .await
        .unwrap();

    let first = engine.resolve_inheritance("urban").await.unwrap();
    let second = engine.resolve_inheritance("urban").await.unwrap();

    assert_eq!(first, second, "Cache hit returns the identical result");
    assert_eq!(engine.metrics().cache_hits, 1);
    assert_eq!(engine.metrics().cache_misses, 1);

    engine.clear_cache();
    let third = engine.resolve_inheritance("urban").await.unwrap();
    assert_eq!(first.resolved, third.resolved);
    assert_eq!(first.conflicts, third.conflicts);
    assert_eq!(engine.metrics().cache_misses, 2);
}

/// The canonical base/urban scenario through the façade.
#[tokio::test]
async fn test_resolve_base_scenario() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1, "b": 2})))
        .await
        .unwrap();
    engine
        .register_template(template("urban", 20, &["base"], json!({"b": 3, "c": 4})))
        .await
        .unwrap();

    let result = engine.resolve_inheritance("urban").await.unwrap();

    assert_eq!(result.resolved.configuration["a"], json!(1));
    assert_eq!(result.resolved.configuration["b"], json!(2));
    assert_eq!(result.resolved.configuration["c"], json!(4));
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].parameter_path, "b");
}

/// Registering a template invalidates cached chains that reference it.
#[tokio::test]
async fn test_registration_invalidates_dependent_chains() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1})))
        .await
        .unwrap();
    engine
        .register_template(template("urban", 20, &["base"], json!({"b": 2})))
        .await
        .unwrap();

    let stale = engine.resolve_inheritance("urban").await.unwrap();
    assert_eq!(stale.resolved.configuration["a"], json!(1));

    // Mutating the parent must not leave the old chain servable.
    engine
        .register_template(template("base", 9, &[], json!({"a": 99})))
        .await
        .unwrap();
    let fresh = engine.resolve_inheritance("urban").await.unwrap();

    assert_eq!(fresh.resolved.configuration["a"], json!(99));
    assert_eq!(
        engine.metrics().cache_hits,
        0,
        "The stale chain must not be served after invalidation"
    );
}

/// Unknown ids and disallowed cycles surface as errors.
#[tokio::test]
async fn test_resolution_errors() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    assert!(matches!(
        engine.resolve_inheritance("ghost").await.unwrap_err(),
        EngineError::NotFound { .. }
    ));

    engine
        .register_template(template("a", 9, &["b"], json!({"x": 1})))
        .await
        .unwrap();
    engine
        .register_template(template("b", 20, &["a"], json!({"y": 2})))
        .await
        .unwrap();

    assert!(matches!(
        engine.resolve_inheritance("a").await.unwrap_err(),
        EngineError::Inheritance { .. }
    ));
}

// ============================================================================
// Merging
// ============================================================================

/// Merging stores the result under its generated id and emits an event.
#[tokio::test]
async fn test_merge_templates() {
    let (mut engine, recorder) = engine_with_recorder();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1, "b": 2})))
        .await
        .unwrap();
    engine
        .register_template(template("urban", 20, &[], json!({"b": 3, "c": 4})))
        .await
        .unwrap();

    let outcome = engine
        .merge_templates(
            &["base".to_string(), "urban".to_string()],
            ResolutionStrategy::HighestPriorityWins,
        )
        .await
        .unwrap();

    assert!(outcome.template.id.starts_with("merged-"));
    assert!(engine.get_template(&outcome.template.id).is_some());
    assert!(recorder.kinds().contains(&EngineEventKind::TemplateMerged));
    assert_eq!(engine.metrics().templates_merged, 1);
}

/// Missing participants are skipped; an empty intersection is an error.
#[tokio::test]
async fn test_merge_missing_participants() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1})))
        .await
        .unwrap();

    let outcome = engine
        .merge_templates(
            &["base".to_string(), "ghost".to_string()],
            ResolutionStrategy::HighestPriorityWins,
        )
        .await
        .unwrap();
    assert_eq!(outcome.template.id, "base", "Single survivor passes through");

    let error = engine
        .merge_templates(
            &["ghost".to_string()],
            ResolutionStrategy::HighestPriorityWins,
        )
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::NoTemplatesFound { .. }));
}

// ============================================================================
// Variants and Deletion
// ============================================================================

/// Variants inherit from their base and register immediately.
#[tokio::test]
async fn test_generate_variant() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1, "b": 2})))
        .await
        .unwrap();

    let mut overrides = BTreeMap::new();
    overrides.insert("b".to_string(), json!(7));
    let variant = engine
        .generate_variant("base", "base-dense", 20, overrides)
        .await
        .unwrap();

    assert_eq!(variant.inherits_from, vec!["base"]);
    let resolved = engine.resolve_inheritance("base-dense").await.unwrap();
    assert_eq!(resolved.resolved.configuration["a"], json!(1));
    assert_eq!(
        resolved.resolved.configuration["b"],
        json!(2),
        "The base outranks the variant at a lower priority number"
    );

    let error = engine
        .generate_variant("ghost", "v", 20, BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::NotFound { .. }));
}

/// Deletion reports whether anything was removed and purges state.
#[tokio::test]
async fn test_delete_template() {
    let (mut engine, recorder) = engine_with_recorder();
    engine
        .register_template(template("base", 9, &[], json!({"a": 1})))
        .await
        .unwrap();
    let _ = engine.resolve_inheritance("base").await.unwrap();

    assert!(engine.delete_template("base").await);
    assert!(!engine.delete_template("base").await, "Second delete is a no-op");
    assert_eq!(engine.template_count(), 0);
    assert!(engine.metrics().for_template("base").is_none());
    assert!(recorder.kinds().contains(&EngineEventKind::TemplateDeleted));

    assert!(matches!(
        engine.resolve_inheritance("base").await.unwrap_err(),
        EngineError::NotFound { .. }
    ));
}

// ============================================================================
// Standalone Detection
// ============================================================================

/// The standalone detector runs over stored templates by id.
#[tokio::test]
async fn test_detect_conflicts() {
    let mut engine = PriorityTemplateEngine::with_defaults();
    engine
        .register_template(template("a", 9, &[], json!({"p": 1})))
        .await
        .unwrap();
    engine
        .register_template(template("b", 20, &[], json!({"p": 2})))
        .await
        .unwrap();

    let report = engine
        .detect_conflicts(&["a".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(report.conflicts.len(), 1);

    let error = engine
        .detect_conflicts(&["a".to_string(), "ghost".to_string()])
        .unwrap_err();
    assert!(matches!(error, EngineError::NotFound { .. }));
}
