//! Flat-list template merging.
//!
//! Merges templates that are not necessarily in an inheritance
//! relationship: the inputs are sorted by priority, parameter conflicts
//! between exactly these templates are detected and resolved, and a single
//! merged template is produced with full provenance metadata.
//!
//! The merged configuration is keyed by fully flattened dotted paths, the
//! same granularity at which conflicts are detected and resolved.
//! Conditions, evaluations, and custom functions merge by key with the
//! last template in priority order overwriting earlier ones; every such
//! overwrite is recorded as a conflict regardless of the requested
//! strategy.

use chrono::Utc;
use uuid::Uuid;

use crate::conflict::{Conflict, ConflictKind, ConflictingValue};
use crate::detector::ConflictDetector;
use crate::errors::{EngineError, EngineResult};
use crate::resolution::{ConflictResolver, ResolutionStrategy};
use crate::template::Template;
use crate::value::{self, ParameterValue};

/// Result of merging a template list.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged template (or the single input, unchanged).
    pub template: Template,
    /// Every conflict encountered, resolved.
    pub conflicts: Vec<Conflict>,
    /// Non-fatal processing notes (depth-limit cuts and similar).
    pub warnings: Vec<String>,
}

/// Merges flat lists of templates into one.
pub struct TemplateMerger {
    resolver: ConflictResolver,
    max_depth: usize,
}

impl TemplateMerger {
    pub fn new() -> Self {
        Self {
            resolver: ConflictResolver::new(),
            max_depth: value::DEFAULT_MAX_DEPTH,
        }
    }

    /// Merger delegating conflicts to a caller-configured resolver.
    pub fn with_resolver(resolver: ConflictResolver) -> Self {
        Self {
            resolver,
            max_depth: value::DEFAULT_MAX_DEPTH,
        }
    }

    /// Merges `templates` under the requested strategy.
    ///
    /// Zero inputs is an error. A single input is returned unchanged with
    /// no synthetic merge record. Two or more inputs produce a new
    /// template whose id is generated and whose `inherits_from` names
    /// every input in priority order for audit.
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyInput`] on an empty list;
    /// [`EngineError::Conflict`] under
    /// [`ResolutionStrategy::FailOnConflict`] when any parameter conflict
    /// has no overriding rule.
    pub fn merge(
        &self,
        templates: &[Template],
        strategy: ResolutionStrategy,
    ) -> EngineResult<MergeOutcome> {
        if templates.is_empty() {
            return Err(EngineError::EmptyInput {
                operation: "merge_templates".to_string(),
            });
        }
        if templates.len() == 1 {
            return Ok(MergeOutcome {
                template: templates[0].clone(),
                conflicts: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let mut sorted: Vec<Template> = templates.to_vec();
        sorted.sort_by_key(|template| template.priority);

        // Detect and resolve configuration conflicts between exactly these
        // templates.
        let mut detector = ConflictDetector::with_max_depth(self.max_depth);
        let report = detector.detect_parameter_conflicts_only(&sorted);
        let mut warnings = report.warnings;
        let resolved_conflicts = self.resolver.resolve_all(&report.conflicts, strategy)?;

        let mut resolved_paths: std::collections::BTreeMap<String, Option<ParameterValue>> =
            resolved_conflicts
                .iter()
                .map(|conflict| {
                    (
                        conflict.parameter_path.clone(),
                        conflict.resolved_value.clone(),
                    )
                })
                .collect();

        let mut merged = Template::new(format!("merged-{}", Uuid::new_v4()), 0);
        merged.priority = sorted
            .iter()
            .map(|template| template.priority)
            .min()
            .unwrap_or(0);

        // First-priority-wins for uncontested paths, the resolver's answer
        // for contested ones.
        for template in &sorted {
            for (parameter, nested) in &template.configuration {
                let (flattened, flatten_warnings) =
                    value::flatten_paths(parameter, nested, self.max_depth);
                warnings.extend(
                    flatten_warnings
                        .into_iter()
                        .map(|warning| format!("{}: {warning}", template.id)),
                );
                for (path, leaf) in flattened {
                    if merged.configuration.contains_key(&path) {
                        continue;
                    }
                    match resolved_paths.remove(&path) {
                        Some(Some(resolved_value)) => {
                            merged.configuration.insert(path, resolved_value);
                        }
                        Some(None) => {
                            // Resolution failed for this path; first writer
                            // stands and the failure is already on record.
                            merged.configuration.insert(path, leaf);
                        }
                        None => {
                            merged.configuration.insert(path, leaf);
                        }
                    }
                }
            }
        }

        let mut conflicts = resolved_conflicts;
        self.merge_logic_blocks(&sorted, &mut merged, &mut conflicts);
        self.synthesize_metadata(&sorted, &mut merged);

        tracing::info!(
            merged_id = %merged.id,
            inputs = sorted.len(),
            conflicts = conflicts.len(),
            "templates merged"
        );

        Ok(MergeOutcome {
            template: merged,
            conflicts,
            warnings,
        })
    }

    /// Merges conditions, evaluations, and custom functions by key.
    ///
    /// Unlike configuration values, logic blocks always resolve as
    /// "incoming overwrites existing": the last template in priority order
    /// wins, the collision is recorded, and the requested strategy plays
    /// no part.
    fn merge_logic_blocks(
        &self,
        sorted: &[Template],
        merged: &mut Template,
        conflicts: &mut Vec<Conflict>,
    ) {
        let mut condition_owners: std::collections::BTreeMap<String, (String, u32)> =
            Default::default();
        let mut evaluation_owners: std::collections::BTreeMap<String, (String, u32)> =
            Default::default();
        let mut function_owners: std::collections::BTreeMap<String, (String, u32)> =
            Default::default();

        for template in sorted {
            for (key, condition) in &template.conditions {
                if let Some((owner_id, owner_priority)) = condition_owners.get(key).cloned() {
                    let existing = serde_json::to_value(&merged.conditions[key])
                        .unwrap_or(ParameterValue::Null);
                    let incoming =
                        serde_json::to_value(condition).unwrap_or(ParameterValue::Null);
                    if existing != incoming {
                        conflicts.push(overwrite_conflict(
                            key,
                            ConflictKind::Conditional,
                            (&owner_id, owner_priority, existing),
                            (&template.id, template.priority, incoming),
                            "condition",
                        ));
                    }
                }
                merged.conditions.insert(key.clone(), condition.clone());
                condition_owners.insert(key.clone(), (template.id.clone(), template.priority));
            }

            for (key, evaluation) in &template.evaluations {
                if let Some((owner_id, owner_priority)) = evaluation_owners.get(key).cloned() {
                    let existing = serde_json::to_value(&merged.evaluations[key])
                        .unwrap_or(ParameterValue::Null);
                    let incoming =
                        serde_json::to_value(evaluation).unwrap_or(ParameterValue::Null);
                    if existing != incoming {
                        conflicts.push(overwrite_conflict(
                            key,
                            ConflictKind::Conditional,
                            (&owner_id, owner_priority, existing),
                            (&template.id, template.priority, incoming),
                            "evaluation",
                        ));
                    }
                }
                merged.evaluations.insert(key.clone(), evaluation.clone());
                evaluation_owners.insert(key.clone(), (template.id.clone(), template.priority));
            }

            for function in &template.custom_functions {
                if let Some((owner_id, owner_priority)) =
                    function_owners.get(&function.name).cloned()
                {
                    let existing = merged
                        .custom_functions
                        .iter()
                        .find(|candidate| candidate.name == function.name)
                        .and_then(|candidate| serde_json::to_value(candidate).ok())
                        .unwrap_or(ParameterValue::Null);
                    let incoming =
                        serde_json::to_value(function).unwrap_or(ParameterValue::Null);
                    if existing != incoming {
                        conflicts.push(overwrite_conflict(
                            &function.name,
                            ConflictKind::Function,
                            (&owner_id, owner_priority, existing),
                            (&template.id, template.priority, incoming),
                            "custom function",
                        ));
                    }
                    merged
                        .custom_functions
                        .retain(|candidate| candidate.name != function.name);
                }
                merged.custom_functions.push(function.clone());
                function_owners.insert(function.name.clone(), (template.id.clone(), template.priority));
            }
        }
    }

    /// Synthesizes merge provenance metadata.
    fn synthesize_metadata(&self, sorted: &[Template], merged: &mut Template) {
        for template in sorted {
            for tag in &template.tags {
                if !merged.tags.contains(tag) {
                    merged.tags.push(tag.clone());
                }
            }
            for author in &template.authors {
                if !merged.authors.contains(author) {
                    merged.authors.push(author.clone());
                }
            }
            // Audit trail: every input, in priority order.
            merged.inherits_from.push(template.id.clone());
            if merged.version.is_none() {
                merged.version = template.version.clone();
            }
            if merged.environment.is_none() {
                merged.environment = template.environment.clone();
            }
        }
        merged.description = Some(format!(
            "Merged from {} templates: {}",
            sorted.len(),
            merged.inherits_from.join(", ")
        ));
        merged.created = Some(Utc::now());
    }
}

impl Default for TemplateMerger {
    fn default() -> Self {
        Self::new()
    }
}

fn overwrite_conflict(
    key: &str,
    kind: ConflictKind,
    existing: (&str, u32, ParameterValue),
    incoming: (&str, u32, ParameterValue),
    label: &str,
) -> Conflict {
    let (owner_id, owner_priority, existing_value) = existing;
    let (incoming_id, incoming_priority, incoming_value) = incoming;
    let mut conflict = Conflict::new(
        key,
        kind,
        vec![
            ConflictingValue {
                template_id: owner_id.to_string(),
                priority: owner_priority,
                value: existing_value,
            },
            ConflictingValue {
                template_id: incoming_id.to_string(),
                priority: incoming_priority,
                value: incoming_value.clone(),
            },
        ],
    );
    conflict.resolved_value = Some(incoming_value);
    conflict.resolution_strategy = None;
    conflict.reason = Some(format!(
        "Later {label} '{key}' from template '{incoming_id}' (priority {incoming_priority}) \
         overwrites definition from '{owner_id}'"
    ));
    conflict
}

#[cfg(test)]
#[path = "merger_tests.rs"]
mod tests;
