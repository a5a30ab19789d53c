//! Engine error types.
//!
//! Domain-specific errors for template registration, inheritance
//! resolution, and merge operations.
//!
//! Non-critical inconsistencies (missing parents during chain building,
//! depth limits reached during recursion) are never surfaced through these
//! types; they are recorded as warnings on the relevant result object and
//! processing continues.

use thiserror::Error;

use crate::conflict::Conflict;
use crate::validator::ValidationIssue;

/// Template engine errors.
///
/// These errors occur when registering, resolving, or merging templates.
/// All of them are raised immediately and never downgraded to warnings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Template '{template_id}' failed validation with {} issue(s)", .issues.len())]
    Validation {
        template_id: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Inheritance resolution failed for '{template_id}': {reason}")]
    Inheritance { template_id: String, reason: String },

    #[error("Unresolved conflict on parameter '{}'", .conflict.parameter_path)]
    Conflict { conflict: Box<Conflict> },

    #[error("Template not found: {template_id}")]
    NotFound { template_id: String },

    #[error("None of the requested templates were found: {requested:?}")]
    NoTemplatesFound { requested: Vec<String> },

    #[error("Operation '{operation}' requires at least one template")]
    EmptyInput { operation: String },

    #[error("Failed to parse template: {reason}")]
    Parse { reason: String },
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
