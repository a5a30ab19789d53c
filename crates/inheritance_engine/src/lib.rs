//! Priority-based template inheritance and conflict resolution for radio
//! network configuration.
//!
//! Templates carry a numeric priority (smaller number = higher
//! precedence), a map of dotted parameter paths to values, conditional and
//! evaluation logic blocks, custom function definitions, and the list of
//! templates they inherit from. This crate resolves inheritance chains
//! over those templates, detects and arbitrates parameter conflicts, and
//! produces fully merged configurations with a complete audit trail.
//!
//! # Components
//!
//! - [`TemplateStore`] - owner of registered templates.
//! - [`GraphBuilder`] / [`InheritanceGraph`] - derived dependency graph
//!   with depth computation and cycle detection.
//! - [`InheritanceResolver`] - ancestors-first chain resolution and
//!   priority-ordered merging.
//! - [`ConflictDetector`] - standalone multi-pass conflict scanning.
//! - [`ConflictResolver`] - six-strategy conflict arbitration with a
//!   pattern-matched parameter rule table.
//! - [`TemplateMerger`] - flat-list merging with provenance metadata.
//! - [`PriorityTemplateEngine`] - the façade wiring all of the above with
//!   caching, validation, events, and metrics.
//!
//! # Example
//!
//! ```rust
//! use inheritance_engine::{PriorityTemplateEngine, Template};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = PriorityTemplateEngine::with_defaults();
//!
//! let mut base = Template::new("base", 9);
//! base.configuration.insert("cell.qRxLev".to_string(), json!(-120));
//! engine.register_template(base).await?;
//!
//! let mut urban = Template::new("urban", 20);
//! urban.inherits_from.push("base".to_string());
//! urban.configuration.insert("cell.qRxLev".to_string(), json!(-110));
//! engine.register_template(urban).await?;
//!
//! let result = engine.resolve_inheritance("urban").await?;
//! assert_eq!(result.resolved.configuration["cell.qRxLev"], json!(-120));
//! assert_eq!(result.conflicts.len(), 1);
//! # Ok(())
//! # }
//! ```

// Core data model
pub mod conflict;
pub mod template;
pub mod value;

// Storage and derived graph
pub mod graph;
pub mod store;

// Detection, resolution, and merging
pub mod detector;
pub mod merger;
pub mod resolution;
pub mod resolver;

// Engine façade and its collaborators
pub mod cache;
pub mod engine;
pub mod events;
pub mod metrics;

// Validation
pub mod basic_validator;
pub mod validator;

// Template ingestion
pub mod loader;

// Errors
pub mod errors;

// Re-export for convenient access
pub use basic_validator::BasicTemplateValidator;
pub use cache::ResolutionCache;
pub use conflict::{
    AppliedStrategy, Conflict, ConflictKind, ConflictSeverity, ConflictingValue,
};
pub use detector::{ConflictDetector, ConflictReport};
pub use engine::{EngineOptions, PriorityTemplateEngine};
pub use errors::{EngineError, EngineResult};
pub use events::{
    EngineEvent, EngineEventKind, EventPublisher, NullEventPublisher, TracingEventPublisher,
};
pub use graph::{
    CycleReport, CycleSeverity, GraphBuilder, InheritanceGraph, ReferenceExtractor,
    RegexReferenceExtractor,
};
pub use merger::{MergeOutcome, TemplateMerger};
pub use metrics::{EngineMetrics, TemplateMetrics};
pub use resolution::{ConflictResolver, CustomResolverFn, MergeStrategy, ResolutionStrategy};
pub use resolver::{ChainLink, InheritanceChainResult, InheritanceResolver, ResolutionOptions};
pub use store::TemplateStore;
pub use template::{ConditionBlock, CustomFunction, Evaluation, Template};
pub use validator::{IssueSeverity, TemplateValidator, ValidationIssue, ValidationReport};
pub use value::ParameterValue;
