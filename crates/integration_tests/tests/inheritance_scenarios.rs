//! End-to-end inheritance scenarios through the engine façade.

use inheritance_engine::{
    EngineError, MergeStrategy, PriorityTemplateEngine, ResolutionOptions, ResolutionStrategy,
};
use integration_tests::init_tracing;
use serde_json::json;
use test_utils::{base_and_urban, TemplateBuilder};

async fn engine_with(templates: Vec<inheritance_engine::Template>) -> PriorityTemplateEngine {
    let mut engine = PriorityTemplateEngine::with_defaults();
    for template in templates {
        engine
            .register_template(template)
            .await
            .expect("fixture templates validate");
    }
    engine
}

// ============================================================================
// Chain Resolution
// ============================================================================

/// Deep four-tier hierarchy: override authority outranks base, base
/// outranks specializations, and every overwrite attempt is on record.
#[tokio::test]
async fn test_four_tier_hierarchy() {
    init_tracing();
    let mut engine = engine_with(vec![
        TemplateBuilder::new("override-auth", 0)
            .parameter("cell.qRxLev", json!(-130))
            .build(),
        TemplateBuilder::new("base", 9)
            .parameter("cell.qRxLev", json!(-120))
            .parameter("cell.power", json!(43))
            .build(),
        TemplateBuilder::new("urban", 20)
            .inherits("base")
            .inherits("override-auth")
            .parameter("cell.power", json!(40))
            .parameter("cell.tac", json!(101))
            .build(),
        TemplateBuilder::new("urban-dense", 30)
            .inherits("urban")
            .parameter("cell.tac", json!(202))
            .parameter("cell.cellName", json!("dense-1"))
            .build(),
    ])
    .await;

    let result = engine.resolve_inheritance("urban-dense").await.unwrap();

    let chain_ids: Vec<&str> = result
        .chain
        .iter()
        .map(|link| link.template_id.as_str())
        .collect();
    assert_eq!(chain_ids, vec!["override-auth", "base", "urban", "urban-dense"]);

    let config = &result.resolved.configuration;
    assert_eq!(config["cell.qRxLev"], json!(-130), "Priority 0 wins");
    assert_eq!(config["cell.power"], json!(43), "Base outranks urban");
    assert_eq!(config["cell.tac"], json!(101), "Urban outranks urban-dense");
    assert_eq!(config["cell.cellName"], json!("dense-1"));

    assert_eq!(
        result.conflicts.len(),
        3,
        "qRxLev, power, and tac were each contested once"
    );
}

/// Implicit dependencies extracted from expression text join the chain.
#[tokio::test]
async fn test_implicit_reference_joins_chain() {
    init_tracing();
    let mut engine = engine_with(vec![
        TemplateBuilder::new("powerBoostTemplate", 5)
            .parameter("cell.power", json!(46))
            .build(),
        TemplateBuilder::new("urban", 20)
            .parameter("cell.tac", json!(7))
            .evaluation("cell.power", "scale(powerBoostTemplate, 0.9)")
            .build(),
    ])
    .await;

    let result = engine.resolve_inheritance("urban").await.unwrap();

    assert_eq!(
        result.resolved.configuration["cell.power"],
        json!(46),
        "The referenced template contributes its parameters"
    );
    assert!(result
        .chain
        .iter()
        .any(|link| link.template_id == "powerBoostTemplate"));
}

/// The cycle triangle: detection reports it, strict resolution refuses it,
/// permissive resolution breaks it with a warning.
#[tokio::test]
async fn test_cycle_triangle() {
    init_tracing();
    let mut engine = engine_with(vec![
        TemplateBuilder::new("a", 9)
            .inherits("b")
            .parameter("x", json!(1))
            .build(),
        TemplateBuilder::new("b", 20)
            .inherits("c")
            .parameter("y", json!(2))
            .build(),
        TemplateBuilder::new("c", 30)
            .inherits("a")
            .parameter("z", json!(3))
            .build(),
    ])
    .await;

    let strict = engine.resolve_inheritance("a").await.unwrap_err();
    assert!(matches!(strict, EngineError::Inheritance { .. }));

    let permissive = engine
        .resolve_inheritance_with(
            "a",
            ResolutionOptions {
                allow_circular_dependencies: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(permissive
        .warnings
        .iter()
        .any(|warning| warning.contains("Circular dependency broken")));
    let config = &permissive.resolved.configuration;
    assert_eq!(config["x"], json!(1));
    assert_eq!(config["y"], json!(2));
    assert_eq!(config["z"], json!(3));
}

// ============================================================================
// Merge Scenarios
// ============================================================================

/// Fail-on-conflict across the façade carries the contested path.
#[tokio::test]
async fn test_merge_fail_on_conflict() {
    init_tracing();
    let mut engine = engine_with(base_and_urban()).await;

    let error = engine
        .merge_templates(
            &["base".to_string(), "urban".to_string()],
            ResolutionStrategy::FailOnConflict,
        )
        .await
        .unwrap_err();

    match error {
        EngineError::Conflict { conflict } => assert_eq!(conflict.parameter_path, "b"),
        other => panic!("Expected Conflict error, got {other:?}"),
    }
}

/// A merged template is immediately resolvable and keeps provenance.
#[tokio::test]
async fn test_merged_template_round_trip() {
    init_tracing();
    let mut engine = engine_with(base_and_urban()).await;

    let outcome = engine
        .merge_templates(
            &["base".to_string(), "urban".to_string()],
            ResolutionStrategy::HighestPriorityWins,
        )
        .await
        .unwrap();

    let resolved = engine
        .resolve_inheritance(&outcome.template.id)
        .await
        .unwrap();

    assert_eq!(resolved.resolved.configuration["a"], json!(1));
    assert_eq!(resolved.resolved.configuration["b"], json!(2));
    assert_eq!(resolved.resolved.configuration["c"], json!(4));
    assert_eq!(
        outcome.template.inherits_from,
        vec!["base", "urban"],
        "Provenance names every input in priority order"
    );
}

// ============================================================================
// Strategy Interplay
// ============================================================================

/// Custom parameter rules hold across resolution options and merge
/// strategies alike.
#[tokio::test]
async fn test_rules_hold_everywhere() {
    init_tracing();
    let fixtures = || {
        vec![
            TemplateBuilder::new("base", 9)
                .parameter("neighborList", json!(["cell-1", "cell-2"]))
                .parameter("anr.featureEnabled", json!(false))
                .build(),
            TemplateBuilder::new("urban", 20)
                .inherits("base")
                .parameter("neighborList", json!(["cell-2", "cell-3"]))
                .parameter("anr.featureEnabled", json!(true))
                .build(),
        ]
    };

    // Through chain resolution, under two different strategies.
    for strategy in [MergeStrategy::Override, MergeStrategy::Merge] {
        let mut engine = engine_with(fixtures()).await;
        let result = engine
            .resolve_inheritance_with(
                "urban",
                ResolutionOptions {
                    strategy,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            result.resolved.configuration["neighborList"],
            json!(["cell-1", "cell-2", "cell-3"])
        );
        assert_eq!(result.resolved.configuration["anr.featureEnabled"], json!(true));
    }

    // Through flat merge, even when conflicts would otherwise fail.
    let mut engine = engine_with(fixtures()).await;
    let outcome = engine
        .merge_templates(
            &["base".to_string(), "urban".to_string()],
            ResolutionStrategy::FailOnConflict,
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.template.configuration["neighborList"],
        json!(["cell-1", "cell-2", "cell-3"])
    );
    assert_eq!(
        outcome.template.configuration["anr.featureEnabled"],
        json!(true)
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Register → resolve → mutate parent → resolve → delete, with the cache
/// staying coherent throughout.
#[tokio::test]
async fn test_lifecycle_cache_coherence() {
    init_tracing();
    let mut engine = engine_with(base_and_urban()).await;

    let before = engine.resolve_inheritance("urban").await.unwrap();
    assert_eq!(before.resolved.configuration["a"], json!(1));

    engine
        .register_template(
            TemplateBuilder::new("base", 9)
                .parameter("a", json!(42))
                .parameter("b", json!(2))
                .build(),
        )
        .await
        .unwrap();

    let after = engine.resolve_inheritance("urban").await.unwrap();
    assert_eq!(
        after.resolved.configuration["a"],
        json!(42),
        "Parent mutation must reach dependent chains"
    );

    assert!(engine.delete_template("base").await);
    let orphaned = engine.resolve_inheritance("urban").await.unwrap();
    assert!(
        orphaned
            .warnings
            .iter()
            .any(|warning| warning.contains("not found")),
        "Deleted parent becomes a warning, not a failure"
    );
    assert_eq!(orphaned.resolved.configuration["b"], json!(3));
}
