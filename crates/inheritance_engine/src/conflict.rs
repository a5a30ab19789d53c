//! Conflict records.
//!
//! A conflict is a detected disagreement on one parameter path (or
//! condition key, function name, or metadata field) across two or more
//! templates. Conflicts are created by the detector or by the merge paths,
//! resolved at most once (filling in `resolved_value` and `reason`), and
//! immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::resolution::{MergeStrategy, ResolutionStrategy};
use crate::value::ParameterValue;

/// Category of disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same path, different leaf values of the same type.
    Value,
    /// Same path, values of different runtime types.
    Type,
    /// Templates disagree on the object structure.
    Structure,
    /// Same condition key with differing logic.
    Conditional,
    /// Same custom-function name with differing bodies.
    Function,
    /// Descriptive metadata fields differ.
    Metadata,
}

/// Conflict severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// The approach that settled a conflict, recorded for audit.
///
/// Conflicts are settled either by one of the six
/// [`ResolutionStrategy`] values (detector/merger path) or by one of the
/// per-parameter [`MergeStrategy`] values (chain resolution path); this
/// flat enum covers both so every resolved conflict can name its approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedStrategy {
    HighestPriorityWins,
    LowestPriorityWins,
    MergeWithWarning,
    CustomFunction,
    FailOnConflict,
    ConflictLogging,
    Override,
    Merge,
    Append,
    Intersect,
    Custom,
}

impl From<ResolutionStrategy> for AppliedStrategy {
    fn from(strategy: ResolutionStrategy) -> Self {
        match strategy {
            ResolutionStrategy::HighestPriorityWins => Self::HighestPriorityWins,
            ResolutionStrategy::LowestPriorityWins => Self::LowestPriorityWins,
            ResolutionStrategy::MergeWithWarning => Self::MergeWithWarning,
            ResolutionStrategy::CustomFunction => Self::CustomFunction,
            ResolutionStrategy::FailOnConflict => Self::FailOnConflict,
            ResolutionStrategy::ConflictLogging => Self::ConflictLogging,
        }
    }
}

impl From<MergeStrategy> for AppliedStrategy {
    fn from(strategy: MergeStrategy) -> Self {
        match strategy {
            MergeStrategy::Override => Self::Override,
            MergeStrategy::Merge => Self::Merge,
            MergeStrategy::Append => Self::Append,
            MergeStrategy::Intersect => Self::Intersect,
            MergeStrategy::Custom => Self::Custom,
        }
    }
}

/// One template's contribution to a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingValue {
    /// Contributing template.
    pub template_id: String,
    /// That template's priority at detection time.
    pub priority: u32,
    /// The value it supplied.
    pub value: ParameterValue,
}

/// A detected disagreement between templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Dotted parameter path (or condition key / function name / metadata
    /// field, depending on `kind`).
    pub parameter_path: String,

    /// Category of the disagreement.
    pub kind: ConflictKind,

    /// Assigned severity.
    pub severity: ConflictSeverity,

    /// Every contributing (template, priority, value) triple.
    pub conflicting_values: Vec<ConflictingValue>,

    /// Value chosen by resolution, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<ParameterValue>,

    /// Strategy that produced the resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<AppliedStrategy>,

    /// Human-readable justification for the resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Whether an operator must review the resolution.
    #[serde(default)]
    pub requires_manual_intervention: bool,
}

impl Conflict {
    /// Creates an unresolved conflict, assigning severity from the kind and
    /// the contributor priority spread.
    pub fn new(
        parameter_path: impl Into<String>,
        kind: ConflictKind,
        conflicting_values: Vec<ConflictingValue>,
    ) -> Self {
        let severity = severity_for(kind, &conflicting_values);
        Self {
            parameter_path: parameter_path.into(),
            kind,
            severity,
            conflicting_values,
            resolved_value: None,
            resolution_strategy: None,
            reason: None,
            requires_manual_intervention: kind == ConflictKind::Conditional,
        }
    }

    /// Ids of the contributing templates, in contribution order.
    pub fn template_ids(&self) -> Vec<&str> {
        self.conflicting_values
            .iter()
            .map(|contribution| contribution.template_id.as_str())
            .collect()
    }

    /// The contribution with the numerically smallest priority, i.e. the
    /// highest-precedence contributor.
    pub fn highest_precedence(&self) -> Option<&ConflictingValue> {
        self.conflicting_values
            .iter()
            .min_by_key(|contribution| contribution.priority)
    }

    /// The contribution with the numerically largest priority.
    pub fn lowest_precedence(&self) -> Option<&ConflictingValue> {
        self.conflicting_values
            .iter()
            .max_by_key(|contribution| contribution.priority)
    }
}

/// Deterministic severity assignment.
///
/// Conditional conflicts are always critical, function conflicts high, and
/// structural conflicts medium. Anything else is medium when the
/// contributor priority spread exceeds 5 bands, otherwise low.
pub fn severity_for(kind: ConflictKind, contributions: &[ConflictingValue]) -> ConflictSeverity {
    match kind {
        ConflictKind::Conditional => ConflictSeverity::Critical,
        ConflictKind::Function => ConflictSeverity::High,
        ConflictKind::Structure => ConflictSeverity::Medium,
        _ => {
            let min = contributions.iter().map(|c| c.priority).min().unwrap_or(0);
            let max = contributions.iter().map(|c| c.priority).max().unwrap_or(0);
            if max - min > 5 {
                ConflictSeverity::Medium
            } else {
                ConflictSeverity::Low
            }
        }
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
