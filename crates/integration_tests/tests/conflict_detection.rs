//! Standalone conflict detection and template ingestion scenarios.

use inheritance_engine::{
    loader, ConflictDetector, ConflictKind, ConflictSeverity, PriorityTemplateEngine,
};
use integration_tests::init_tracing;
use serde_json::json;
use test_utils::TemplateBuilder;

/// A realistic pair of cell templates disagreeing at several levels at
/// once: parameter, conditional, function, and metadata.
#[tokio::test]
async fn test_full_detection_sweep() {
    init_tracing();
    let noc = TemplateBuilder::new("noc-default", 9)
        .parameter("EUtranCellFDD.qRxLevMin", json!(-120))
        .parameter("EUtranCellFDD.tac", json!(1))
        .condition("cellState", "load < 10", json!("ACTIVE"))
        .function("determineQci", &["service"], &["return 9"])
        .tag("lte")
        .environment("prod")
        .build();
    let field = TemplateBuilder::new("field-trial", 40)
        .parameter("EUtranCellFDD.qRxLevMin", json!(-110))
        .parameter("EUtranCellFDD.tac", json!(1))
        .condition("cellState", "load < 30", json!("ACTIVE"))
        .function("determineQci", &["service"], &["return 7"])
        .tag("trial")
        .environment("test")
        .build();

    let report = ConflictDetector::new().detect(&[noc, field]);

    let conflict_on = |path: &str| {
        report
            .conflicts
            .iter()
            .find(|conflict| conflict.parameter_path == path)
            .unwrap_or_else(|| panic!("expected a conflict on '{path}'"))
    };

    let parameter = conflict_on("EUtranCellFDD.qRxLevMin");
    assert_eq!(parameter.kind, ConflictKind::Value);
    assert_eq!(parameter.conflicting_values.len(), 2);
    assert_eq!(
        parameter.severity,
        ConflictSeverity::Medium,
        "Priority spread above five bands escalates"
    );

    let conditional = conflict_on("cellState");
    assert_eq!(conditional.severity, ConflictSeverity::Critical);
    assert!(conditional.requires_manual_intervention);

    assert_eq!(conflict_on("determineQci").severity, ConflictSeverity::High);
    assert!(report
        .conflicts
        .iter()
        .any(|conflict| conflict.parameter_path == "$meta.environment"));
}

/// Templates loaded from JSON documents flow through the engine unchanged.
#[tokio::test]
async fn test_loaded_templates_resolve() {
    init_tracing();
    let base = loader::template_from_json(
        r#"{
            "id": "base",
            "priority": 9,
            "configuration": {"cell": {"range": 15000, "state": "ACTIVE"}},
            "$custom": [
                {"name": "calcRange", "args": ["dist"], "body": ["return dist * 2"]}
            ]
        }"#,
    )
    .unwrap();
    let coastal = loader::template_from_json(
        r#"{
            "id": "coastal",
            "priority": 30,
            "inherits_from": ["base"],
            "configuration": {"cell": {"range": 30000}}
        }"#,
    )
    .unwrap();

    let mut engine = PriorityTemplateEngine::with_defaults();
    engine.register_template(base).await.unwrap();
    engine.register_template(coastal).await.unwrap();

    let result = engine.resolve_inheritance("coastal").await.unwrap();

    let cell = &result.resolved.configuration["cell"];
    assert_eq!(cell["range"], json!(15000), "Base outranks coastal");
    assert_eq!(cell["state"], json!("ACTIVE"));
    assert_eq!(result.resolved.custom_functions[0].name, "calcRange");
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].parameter_path, "cell.range");
}
