//! Engine lifecycle events.
//!
//! The engine publishes an event after every state-changing operation.
//! Publishing is fire-and-forget: implementations are expected to swallow
//! their own delivery failures, and nothing a subscriber does can affect
//! the outcome of the operation that raised the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::ParameterValue;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEventKind {
    TemplateRegistered,
    TemplateResolved,
    TemplateMerged,
    TemplateDeleted,
    ValidationFailed,
}

/// One published lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event kind.
    pub event_type: EngineEventKind,

    /// Unique identifier for this event (UUID v4).
    pub event_id: Uuid,

    /// Template the event concerns.
    pub template_id: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Kind-specific payload (conflict counts, chain length, ...).
    pub data: ParameterValue,

    /// Wall-clock cost of the operation, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    /// Failure description for error events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineEvent {
    /// Creates an event stamped with a fresh id and the current time.
    pub fn new(event_type: EngineEventKind, template_id: impl Into<String>) -> Self {
        Self {
            event_type,
            event_id: Uuid::new_v4(),
            template_id: template_id.into(),
            timestamp: Utc::now(),
            data: ParameterValue::Null,
            processing_time_ms: None,
            error: None,
        }
    }

    /// Attaches a payload.
    pub fn with_data(mut self, data: ParameterValue) -> Self {
        self.data = data;
        self
    }

    /// Attaches the operation's processing time.
    pub fn with_processing_time(mut self, milliseconds: u64) -> Self {
        self.processing_time_ms = Some(milliseconds);
        self
    }

    /// Attaches an error description.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Destination for engine lifecycle events.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`.
///
/// # Failure Policy
///
/// `publish` is infallible by contract: implementations handle their own
/// delivery problems (log and drop, buffer, retry) and never surface them
/// to the engine.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivers one event. Best effort.
    async fn publish(&self, event: EngineEvent);
}

/// Publisher that drops every event.
///
/// Default wiring for engines that do not care about lifecycle events.
pub struct NullEventPublisher;

impl NullEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for NullEventPublisher {
    async fn publish(&self, _event: EngineEvent) {}
}

/// Publisher that emits events as structured log records.
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: EngineEvent) {
        tracing::info!(
            event_type = ?event.event_type,
            event_id = %event.event_id,
            template_id = %event.template_id,
            processing_time_ms = event.processing_time_ms,
            error = event.error.as_deref(),
            "engine event"
        );
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
