//! Template validation types and trait.
//!
//! Validation runs at the registration gate: a template that fails
//! validation is never stored. The trait is async so implementations may
//! consult external systems (parameter dictionaries, policy services);
//! the engine itself only looks at the returned report.
//!
//! # Examples
//!
//! ```rust
//! use inheritance_engine::{ValidationIssue, ValidationReport, IssueSeverity};
//!
//! let mut report = ValidationReport::new();
//! assert!(report.is_valid());
//!
//! report.add_issue(ValidationIssue {
//!     message: "priority band 95 is outside every known tier".to_string(),
//!     parameter: Some("priority".to_string()),
//!     severity: IssueSeverity::Warning,
//! });
//! assert!(report.is_valid(), "Warnings do not fail validation");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineResult;
use crate::template::Template;

/// Severity of one validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Blocks registration.
    Error,
    /// Recorded, does not block.
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Human-readable description.
    pub message: String,
    /// Parameter or field the finding concerns, when attributable.
    pub parameter: Option<String>,
    /// Whether the finding blocks registration.
    pub severity: IssueSeverity,
}

/// Result of validating one template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no error-severity issue is present.
    pub fn is_valid(&self) -> bool {
        self.issues
            .iter()
            .all(|issue| issue.severity != IssueSeverity::Error)
    }

    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Error-severity issues only.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
            .collect()
    }

    /// Warning-severity issues only.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
            .collect()
    }
}

/// Template validation service.
///
/// Implementations collect every finding in one pass rather than stopping
/// at the first problem.
#[async_trait]
pub trait TemplateValidator: Send + Sync {
    /// Validates one template.
    ///
    /// # Errors
    ///
    /// Returns an engine error only when the validation machinery itself
    /// fails; validation *findings* belong in the report.
    async fn validate(&self, template: &Template) -> EngineResult<ValidationReport>;
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
