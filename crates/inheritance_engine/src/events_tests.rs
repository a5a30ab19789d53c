//! Tests for engine events.

use super::*;
use serde_json::json;

/// Events are stamped with unique ids.
#[test]
fn test_event_ids_are_unique() {
    let first = EngineEvent::new(EngineEventKind::TemplateRegistered, "base");
    let second = EngineEvent::new(EngineEventKind::TemplateRegistered, "base");

    assert_ne!(first.event_id, second.event_id);
}

/// Builder helpers attach payload and timing.
#[test]
fn test_event_builders() {
    let event = EngineEvent::new(EngineEventKind::TemplateResolved, "urban")
        .with_data(json!({"conflicts": 2}))
        .with_processing_time(12);

    assert_eq!(event.data, json!({"conflicts": 2}));
    assert_eq!(event.processing_time_ms, Some(12));
    assert!(event.error.is_none());
}

/// Events serialize without null optional fields.
#[test]
fn test_event_serialization_skips_absent_fields() {
    let event = EngineEvent::new(EngineEventKind::TemplateDeleted, "base");

    let serialized = serde_json::to_value(&event).unwrap();

    assert_eq!(serialized["event_type"], json!("template_deleted"));
    assert!(serialized.get("processing_time_ms").is_none());
    assert!(serialized.get("error").is_none());
}

/// The null publisher accepts events without effect.
#[tokio::test]
async fn test_null_publisher() {
    let publisher = NullEventPublisher::new();
    publisher
        .publish(EngineEvent::new(EngineEventKind::TemplateMerged, "m"))
        .await;
}
