//! Basic implementation of template validation.
//!
//! Rule-based checks matching the template file format's constraints:
//! identifier presence, custom-function naming, uniqueness, direct
//! self-inheritance, and the known deployment environments.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::EngineResult;
use crate::template::Template;
use crate::validator::{IssueSeverity, TemplateValidator, ValidationIssue, ValidationReport};

/// Environments the template format recognizes.
const KNOWN_ENVIRONMENTS: [&str; 4] = ["dev", "test", "staging", "prod"];

/// Basic rule-based template validator.
///
/// # Examples
///
/// ```rust
/// use inheritance_engine::{BasicTemplateValidator, Template, TemplateValidator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let validator = BasicTemplateValidator::new();
/// let report = validator.validate(&Template::new("base", 9)).await?;
/// assert!(report.is_valid());
/// # Ok(())
/// # }
/// ```
pub struct BasicTemplateValidator {
    function_name: Regex,
}

impl BasicTemplateValidator {
    pub fn new() -> Self {
        Self {
            function_name: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
                .expect("function name pattern is valid"),
        }
    }

    fn check_identifier(&self, template: &Template, report: &mut ValidationReport) {
        if template.id.trim().is_empty() {
            report.add_issue(ValidationIssue {
                message: "template id must not be empty".to_string(),
                parameter: Some("id".to_string()),
                severity: IssueSeverity::Error,
            });
        }
    }

    fn check_inheritance(&self, template: &Template, report: &mut ValidationReport) {
        if template.inherits_from.contains(&template.id) {
            report.add_issue(ValidationIssue {
                message: format!("template '{}' inherits from itself", template.id),
                parameter: Some("inherits_from".to_string()),
                severity: IssueSeverity::Error,
            });
        }
    }

    fn check_functions(&self, template: &Template, report: &mut ValidationReport) {
        let mut seen: HashSet<&str> = HashSet::new();
        for function in &template.custom_functions {
            if !self.function_name.is_match(&function.name) {
                report.add_issue(ValidationIssue {
                    message: format!("invalid custom function name '{}'", function.name),
                    parameter: Some(format!("$custom.{}", function.name)),
                    severity: IssueSeverity::Error,
                });
            }
            if !seen.insert(function.name.as_str()) {
                report.add_issue(ValidationIssue {
                    message: format!("custom function '{}' defined more than once", function.name),
                    parameter: Some(format!("$custom.{}", function.name)),
                    severity: IssueSeverity::Error,
                });
            }
        }
    }

    fn check_environment(&self, template: &Template, report: &mut ValidationReport) {
        if let Some(environment) = &template.environment {
            if !KNOWN_ENVIRONMENTS.contains(&environment.as_str()) {
                report.add_issue(ValidationIssue {
                    message: format!(
                        "unknown environment '{environment}' (expected one of {})",
                        KNOWN_ENVIRONMENTS.join(", ")
                    ),
                    parameter: Some("environment".to_string()),
                    severity: IssueSeverity::Warning,
                });
            }
        }
    }

    fn check_content(&self, template: &Template, report: &mut ValidationReport) {
        if template.is_empty() {
            report.add_issue(ValidationIssue {
                message: "template defines no configuration, conditions, or evaluations"
                    .to_string(),
                parameter: None,
                severity: IssueSeverity::Warning,
            });
        }
    }
}

impl Default for BasicTemplateValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateValidator for BasicTemplateValidator {
    async fn validate(&self, template: &Template) -> EngineResult<ValidationReport> {
        let mut report = ValidationReport::new();

        self.check_identifier(template, &mut report);
        self.check_inheritance(template, &mut report);
        self.check_functions(template, &mut report);
        self.check_environment(template, &mut report);
        self.check_content(template, &mut report);

        Ok(report)
    }
}

#[cfg(test)]
#[path = "basic_validator_tests.rs"]
mod tests;
