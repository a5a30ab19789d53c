//! Conflict resolution strategies and the parameter rule table.
//!
//! Resolution never mutates the detected conflict; it returns a resolved
//! copy with `resolved_value`, `resolution_strategy`, and `reason` filled
//! in. The strategy set is a closed enum so dispatch is checked for
//! exhaustiveness at compile time.
//!
//! # Parameter rules
//!
//! Before any global strategy is applied, the resolver consults a
//! pattern-matched rule table. Rules always take precedence over the
//! strategy, which is what makes e.g. `*Enabled` flags resolve by logical
//! OR no matter how the caller asked for conflicts to be handled. The
//! default table:
//!
//! | Path pattern | Behavior |
//! |---|---|
//! | ends in `List`, `Array`, `Items` | set-union merge |
//! | ends in `Enabled`, `Active`, `Flag` | logical OR across all values |
//! | ends in `Threshold`, `Limit`, `Max`, `Min` | numeric max across all values |
//!
//! Callers may register additional custom rules keyed by regular
//! expression; a failing custom resolver is converted into a
//! failed-resolution record, never an escaped error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::conflict::{AppliedStrategy, Conflict};
use crate::errors::{EngineError, EngineResult};
use crate::value::{self, ParameterValue};

/// How a detected conflict is arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Value from the template with the numerically smallest priority.
    HighestPriorityWins,
    /// Value from the template with the numerically largest priority.
    LowestPriorityWins,
    /// Deep-merge objects / union arrays, falling back to
    /// `HighestPriorityWins` on mixed shapes; logs a warning.
    MergeWithWarning,
    /// Delegate to a registered custom resolver when one matches.
    CustomFunction,
    /// Raise instead of producing a value.
    FailOnConflict,
    /// `HighestPriorityWins` plus a structured log record.
    ConflictLogging,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HighestPriorityWins => "highest_priority_wins",
            Self::LowestPriorityWins => "lowest_priority_wins",
            Self::MergeWithWarning => "merge_with_warning",
            Self::CustomFunction => "custom_function",
            Self::FailOnConflict => "fail_on_conflict",
            Self::ConflictLogging => "conflict_logging",
        };
        write!(f, "{name}")
    }
}

/// Per-parameter merge strategy used during chain resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// First write wins; later templates only fill unset parameters.
    #[default]
    Override,
    /// Shallow-combine objects, set-union arrays.
    Merge,
    /// Concatenate strings/arrays, existing first.
    Append,
    /// Keep only keys/elements present on both sides.
    Intersect,
    /// Consult the parameter rule table only.
    Custom,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Override => "override",
            Self::Merge => "merge",
            Self::Append => "append",
            Self::Intersect => "intersect",
            Self::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Resolver closure registered for a path pattern.
///
/// Receives the full conflict and returns the resolved value, or a message
/// describing why resolution failed.
pub type CustomResolverFn =
    Arc<dyn Fn(&Conflict) -> Result<ParameterValue, String> + Send + Sync>;

/// Built-in rule behaviors.
#[derive(Clone)]
enum RuleAction {
    SetUnion,
    LogicalOr,
    NumericMax,
    Custom(CustomResolverFn),
}

#[derive(Clone)]
enum RulePattern {
    Suffix(&'static str),
    Pattern(Regex),
}

impl RulePattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Suffix(suffix) => path.ends_with(suffix),
            Self::Pattern(pattern) => pattern.is_match(path),
        }
    }
}

/// A single pattern-matched parameter rule.
#[derive(Clone)]
struct ParameterRule {
    pattern: RulePattern,
    action: RuleAction,
}

/// Applies one of the six resolution strategies to detected conflicts.
#[derive(Clone)]
pub struct ConflictResolver {
    rules: Vec<ParameterRule>,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver {
    /// Resolver with the default parameter rule table.
    pub fn new() -> Self {
        let rules = vec![
            ParameterRule {
                pattern: RulePattern::Suffix("List"),
                action: RuleAction::SetUnion,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Array"),
                action: RuleAction::SetUnion,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Items"),
                action: RuleAction::SetUnion,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Enabled"),
                action: RuleAction::LogicalOr,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Active"),
                action: RuleAction::LogicalOr,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Flag"),
                action: RuleAction::LogicalOr,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Threshold"),
                action: RuleAction::NumericMax,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Limit"),
                action: RuleAction::NumericMax,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Max"),
                action: RuleAction::NumericMax,
            },
            ParameterRule {
                pattern: RulePattern::Suffix("Min"),
                action: RuleAction::NumericMax,
            },
        ];
        Self { rules }
    }

    /// Resolver without any parameter rules (global strategy only).
    pub fn without_rules() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registers a custom resolver for paths matching `pattern`.
    ///
    /// Custom rules are consulted before the default table and before the
    /// global strategy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] when the pattern is not a valid
    /// regular expression.
    pub fn register_custom_resolver(
        &mut self,
        pattern: &str,
        resolver: CustomResolverFn,
    ) -> EngineResult<()> {
        let compiled = Regex::new(pattern).map_err(|error| EngineError::Parse {
            reason: format!("invalid custom resolver pattern '{pattern}': {error}"),
        })?;
        self.rules.insert(
            0,
            ParameterRule {
                pattern: RulePattern::Pattern(compiled),
                action: RuleAction::Custom(resolver),
            },
        );
        Ok(())
    }

    /// True when a parameter rule matches the path.
    pub fn has_rule_for(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.pattern.matches(path))
    }

    /// Resolves one conflict with the requested strategy.
    ///
    /// The parameter rule table is consulted first and always wins over the
    /// strategy. The input conflict is never mutated; the returned copy
    /// carries the resolved value, strategy, and reason.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Conflict`] only under
    /// [`ResolutionStrategy::FailOnConflict`] when no rule matched.
    pub fn resolve(
        &self,
        conflict: &Conflict,
        strategy: ResolutionStrategy,
    ) -> EngineResult<Conflict> {
        if let Some(resolved) = self.apply_parameter_rule(conflict, strategy.into()) {
            return Ok(resolved);
        }

        match strategy {
            ResolutionStrategy::HighestPriorityWins => {
                Ok(self.pick_by_precedence(conflict, strategy.into(), true))
            }
            ResolutionStrategy::LowestPriorityWins => {
                Ok(self.pick_by_precedence(conflict, strategy.into(), false))
            }
            ResolutionStrategy::MergeWithWarning => Ok(self.merge_with_warning(conflict)),
            ResolutionStrategy::CustomFunction => {
                // No registered resolver matched; the documented fallback.
                Ok(self.pick_by_precedence(conflict, strategy.into(), true))
            }
            ResolutionStrategy::FailOnConflict => Err(EngineError::Conflict {
                conflict: Box::new(conflict.clone()),
            }),
            ResolutionStrategy::ConflictLogging => {
                tracing::warn!(
                    parameter_path = %conflict.parameter_path,
                    kind = ?conflict.kind,
                    severity = ?conflict.severity,
                    contributors = ?conflict.template_ids(),
                    "conflict resolved by priority with logging"
                );
                Ok(self.pick_by_precedence(conflict, strategy.into(), true))
            }
        }
    }

    /// Applies the first matching parameter rule to a conflict.
    ///
    /// Returns `None` when no rule matches the conflict's path. `applied`
    /// is stamped as the configured approach on the resolved record; the
    /// reason string documents the rule itself.
    pub fn apply_parameter_rule(
        &self,
        conflict: &Conflict,
        applied: AppliedStrategy,
    ) -> Option<Conflict> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(&conflict.parameter_path))
            .map(|rule| self.apply_rule(conflict, rule, applied))
    }

    /// Resolves a batch of conflicts.
    ///
    /// Internal failures of individual custom resolvers are recorded on the
    /// corresponding conflict and never abort the batch; only
    /// `FailOnConflict` propagates an error.
    pub fn resolve_all(
        &self,
        conflicts: &[Conflict],
        strategy: ResolutionStrategy,
    ) -> EngineResult<Vec<Conflict>> {
        conflicts
            .iter()
            .map(|conflict| self.resolve(conflict, strategy))
            .collect()
    }

    fn apply_rule(
        &self,
        conflict: &Conflict,
        rule: &ParameterRule,
        applied: AppliedStrategy,
    ) -> Conflict {
        let mut resolved = conflict.clone();
        resolved.resolution_strategy = Some(applied);

        match &rule.action {
            RuleAction::SetUnion => {
                let union = conflict
                    .conflicting_values
                    .iter()
                    .map(|contribution| contribution.value.clone())
                    .reduce(|accumulated, next| value::set_union(&accumulated, &next));
                resolved.resolved_value = union;
                resolved.reason = Some(format!(
                    "Set union of {} values for '{}' (collection parameter rule)",
                    conflict.conflicting_values.len(),
                    conflict.parameter_path
                ));
            }
            RuleAction::LogicalOr => {
                let any_truthy = conflict
                    .conflicting_values
                    .iter()
                    .any(|contribution| value::truthy(&contribution.value));
                resolved.resolved_value = Some(ParameterValue::Bool(any_truthy));
                resolved.reason = Some(format!(
                    "Logical OR across {} values for '{}' (flag parameter rule)",
                    conflict.conflicting_values.len(),
                    conflict.parameter_path
                ));
            }
            RuleAction::NumericMax => {
                let maximum = conflict
                    .conflicting_values
                    .iter()
                    .filter(|contribution| value::as_number(&contribution.value).is_some())
                    .max_by(|a, b| {
                        let left = value::as_number(&a.value).unwrap_or(f64::NEG_INFINITY);
                        let right = value::as_number(&b.value).unwrap_or(f64::NEG_INFINITY);
                        left.total_cmp(&right)
                    });
                match maximum {
                    Some(winner) => {
                        resolved.resolved_value = Some(winner.value.clone());
                        resolved.reason = Some(format!(
                            "Numeric maximum from template '{}' (priority {}) for '{}'",
                            winner.template_id, winner.priority, conflict.parameter_path
                        ));
                    }
                    None => {
                        // No numeric contributor; fall back to precedence.
                        return self.pick_by_precedence(conflict, applied, true);
                    }
                }
            }
            RuleAction::Custom(resolver) => match resolver(conflict) {
                Ok(value) => {
                    resolved.resolved_value = Some(value);
                    resolved.reason = Some(format!(
                        "Custom resolver applied to '{}'",
                        conflict.parameter_path
                    ));
                }
                Err(message) => {
                    resolved.resolved_value = None;
                    resolved.reason = Some(format!("Resolution failed: {message}"));
                }
            },
        }

        resolved
    }

    fn pick_by_precedence(
        &self,
        conflict: &Conflict,
        applied: AppliedStrategy,
        highest_wins: bool,
    ) -> Conflict {
        let mut resolved = conflict.clone();
        resolved.resolution_strategy = Some(applied);

        let winner = if highest_wins {
            conflict.highest_precedence()
        } else {
            conflict.lowest_precedence()
        };

        match winner {
            Some(contribution) => {
                resolved.resolved_value = Some(contribution.value.clone());
                resolved.reason = Some(format!(
                    "Template '{}' (priority {}) wins '{}' over {} other contributor(s)",
                    contribution.template_id,
                    contribution.priority,
                    conflict.parameter_path,
                    conflict.conflicting_values.len().saturating_sub(1)
                ));
            }
            None => {
                resolved.resolved_value = None;
                resolved.reason = Some("Resolution failed: conflict has no contributors".into());
            }
        }

        resolved
    }

    fn merge_with_warning(&self, conflict: &Conflict) -> Conflict {
        let values: Vec<&ParameterValue> = conflict
            .conflicting_values
            .iter()
            .map(|contribution| &contribution.value)
            .collect();

        let all_objects = !values.is_empty() && values.iter().all(|v| v.is_object());
        let all_arrays = !values.is_empty() && values.iter().all(|v| v.is_array());

        if all_objects {
            let merged = values
                .iter()
                .map(|v| (*v).clone())
                .reduce(|accumulated, next| value::deep_merge(&accumulated, &next))
                .expect("at least one contributor");
            tracing::warn!(
                parameter_path = %conflict.parameter_path,
                "conflicting objects deep-merged"
            );
            let mut resolved = conflict.clone();
            resolved.resolution_strategy =
                Some(ResolutionStrategy::MergeWithWarning.into());
            resolved.resolved_value = Some(merged);
            resolved.reason = Some(format!(
                "Deep-merged {} object values for '{}'",
                conflict.conflicting_values.len(),
                conflict.parameter_path
            ));
            return resolved;
        }

        if all_arrays {
            let union = values
                .iter()
                .map(|v| (*v).clone())
                .reduce(|accumulated, next| value::set_union(&accumulated, &next))
                .expect("at least one contributor");
            tracing::warn!(
                parameter_path = %conflict.parameter_path,
                "conflicting arrays merged as set union"
            );
            let mut resolved = conflict.clone();
            resolved.resolution_strategy =
                Some(ResolutionStrategy::MergeWithWarning.into());
            resolved.resolved_value = Some(union);
            resolved.reason = Some(format!(
                "Set union of {} array values for '{}'",
                conflict.conflicting_values.len(),
                conflict.parameter_path
            ));
            return resolved;
        }

        // Mixed shapes cannot be merged structurally.
        self.pick_by_precedence(conflict, ResolutionStrategy::MergeWithWarning.into(), true)
    }
}

#[cfg(test)]
#[path = "resolution_tests.rs"]
mod tests;
