//! Template records and their embedded logic blocks.
//!
//! A template is the unit of radio-network configuration: a priority, a map
//! of dotted parameter paths to values, optional conditional and evaluation
//! blocks, custom function definitions, and the list of templates it
//! inherits from.
//!
//! The JSON representation follows the established template file format:
//! conditional logic under `$cond`, evaluations under `$eval`, and custom
//! functions under `$custom`. Function bodies and expressions are carried as
//! literal text; this crate never executes them.
//!
//! # Priority
//!
//! Priorities are non-negative integers where the **smaller** number wins a
//! conflict. The conventional bands (0 override-authority, 9 base, 20/30/40
//! specialization tiers, 50-80 relation-specific tiers) are not enforced.
//!
//! # Examples
//!
//! ```rust
//! use inheritance_engine::Template;
//! use serde_json::json;
//!
//! let mut base = Template::new("base", 9);
//! base.configuration
//!     .insert("cell.qRxLevMin".to_string(), json!(-120));
//!
//! let mut urban = Template::new("urban", 20);
//! urban.inherits_from.push("base".to_string());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::ParameterValue;

/// Priority band conventionally used for base templates.
pub const BASE_PRIORITY: u32 = 9;

/// Priority band reserved for override-authority templates.
pub const OVERRIDE_AUTHORITY_PRIORITY: u32 = 0;

/// A configuration template.
///
/// Templates are identified by `id` (the template file format historically
/// calls this "version"; it is semantically an identifier and the store
/// key). The optional `version` field is descriptive metadata, distinct
/// from the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier and store key.
    pub id: String,

    /// Numeric precedence. Lower number = higher precedence.
    pub priority: u32,

    /// Dotted parameter path → value.
    ///
    /// Values are leaf scalars, arrays, or nested objects. A `BTreeMap`
    /// keeps iteration deterministic so merges are reproducible.
    #[serde(default)]
    pub configuration: BTreeMap<String, ParameterValue>,

    /// Conditional logic blocks, keyed by the field they produce.
    #[serde(default, rename = "$cond")]
    pub conditions: BTreeMap<String, ConditionBlock>,

    /// Evaluation expressions, keyed by the field they produce.
    #[serde(default, rename = "$eval")]
    pub evaluations: BTreeMap<String, Evaluation>,

    /// Custom function definitions, unique by name within one template.
    #[serde(default, rename = "$custom")]
    pub custom_functions: Vec<CustomFunction>,

    /// Parent template ids this template inherits from.
    #[serde(default)]
    pub inherits_from: Vec<String>,

    /// Descriptive version string (metadata, not the store key).
    #[serde(default)]
    pub version: Option<String>,

    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,

    /// Template authors.
    #[serde(default)]
    pub authors: Vec<String>,

    /// Classification tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Deployment environment (dev, test, staging, prod).
    #[serde(default)]
    pub environment: Option<String>,

    /// Names of validation rule sets downstream tooling should apply.
    #[serde(default)]
    pub validation_rules: Vec<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl Template {
    /// Creates an empty template with the given id and priority.
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            configuration: BTreeMap::new(),
            conditions: BTreeMap::new(),
            evaluations: BTreeMap::new(),
            custom_functions: Vec::new(),
            inherits_from: Vec::new(),
            version: None,
            description: None,
            authors: Vec::new(),
            tags: Vec::new(),
            environment: None,
            validation_rules: Vec::new(),
            created: None,
        }
    }

    /// True when the template carries no configuration, conditions, or
    /// evaluations.
    pub fn is_empty(&self) -> bool {
        self.configuration.is_empty() && self.conditions.is_empty() && self.evaluations.is_empty()
    }

    /// All text fragments that may embed template references: evaluation
    /// expressions plus condition predicates and branches.
    ///
    /// Used by the graph builder to discover implicit dependencies.
    pub fn reference_texts(&self) -> Vec<&str> {
        let mut texts: Vec<&str> = Vec::new();
        for evaluation in self.evaluations.values() {
            texts.push(&evaluation.expression);
        }
        for condition in self.conditions.values() {
            texts.push(&condition.predicate);
            if let Some(branch) = condition.then_branch.as_str() {
                texts.push(branch);
            }
            if let Some(branch) = condition.else_branch.as_ref().and_then(|v| v.as_str()) {
                texts.push(branch);
            }
        }
        texts
    }
}

/// Conditional block: predicate plus then/else branches.
///
/// The else branch is optional; an absent else means the field is simply
/// not produced when the predicate is false (the file format's legacy
/// `__ignore__` sentinel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBlock {
    /// Condition expression, carried as literal text.
    #[serde(rename = "if")]
    pub predicate: String,

    /// Value produced when the predicate holds.
    #[serde(rename = "then")]
    pub then_branch: ParameterValue,

    /// Value produced otherwise, if any.
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_branch: Option<ParameterValue>,
}

/// Evaluation block: an expression and its named arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Expression text. Never evaluated by this crate.
    #[serde(rename = "eval")]
    pub expression: String,

    /// Named arguments passed to the expression.
    #[serde(default)]
    pub arguments: BTreeMap<String, ParameterValue>,
}

/// Custom function definition.
///
/// Bodies are ordered lines of literal text; execution is the concern of a
/// downstream processor, never of this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFunction {
    /// Function name, unique within one template.
    pub name: String,

    /// Argument names.
    #[serde(default)]
    pub args: Vec<String>,

    /// Body lines.
    #[serde(default)]
    pub body: Vec<String>,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
