//! Inheritance chain resolution.
//!
//! Resolving a template walks its ancestry (parents before children),
//! orders the chain by priority, and merges configuration, conditions,
//! evaluations, and custom functions front-to-back. The merge is
//! first-write-wins: because the chain is sorted ascending by priority
//! number, the first writer of a parameter is the highest-precedence
//! template, and later templates may only fill in parameters not already
//! set, unless a per-parameter strategy or a matching parameter rule says
//! otherwise.
//!
//! Every overwrite attempt is recorded as a conflict, even when the answer
//! is "first write wins"; the chain result is a complete audit trail of
//! what was applied from where.
//!
//! Only the up-front cycle gate is a hard failure. Everything the walk
//! encounters later (missing parents, cycle re-entry, depth limits) is
//! recorded as a warning and resolution continues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictKind, ConflictingValue};
use crate::errors::{EngineError, EngineResult};
use crate::graph::{GraphBuilder, InheritanceGraph};
use crate::resolution::{ConflictResolver, MergeStrategy};
use crate::store::TemplateStore;
use crate::template::Template;
use crate::value::{self, ParameterValue};

/// Options controlling one resolution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOptions {
    /// Global per-parameter merge strategy.
    pub strategy: MergeStrategy,
    /// Maximum inheritance walk depth.
    pub max_depth: usize,
    /// When false, an error-severity cycle reachable from the target fails
    /// the request instead of being broken with a warning.
    pub allow_circular_dependencies: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Override,
            max_depth: value::DEFAULT_MAX_DEPTH,
            allow_circular_dependencies: false,
        }
    }
}

impl ResolutionOptions {
    /// Stable serialized form used in cache keys.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.strategy, self.max_depth, self.allow_circular_dependencies
        )
    }
}

/// One applied step of a resolved chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub template_id: String,
    pub priority: u32,
    /// When this template's contribution was merged.
    pub applied_at: DateTime<Utc>,
    /// Parameters this template introduced or contributed to.
    pub applied_parameters: Vec<String>,
}

/// Output of resolving one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceChainResult {
    /// The requested template.
    pub template_id: String,
    /// Applied templates in merge order (highest precedence first).
    pub chain: Vec<ChainLink>,
    /// Fully merged template; a fresh object, never a stored record.
    pub resolved: Template,
    /// Every conflict encountered while merging.
    pub conflicts: Vec<Conflict>,
    /// Non-fatal inconsistencies: missing parents, broken cycles, depth
    /// limits.
    pub warnings: Vec<String>,
}

/// Resolves inheritance chains against a template store.
pub struct InheritanceResolver {
    graph_builder: GraphBuilder,
    conflict_resolver: ConflictResolver,
}

impl InheritanceResolver {
    pub fn new() -> Self {
        Self {
            graph_builder: GraphBuilder::new(),
            conflict_resolver: ConflictResolver::new(),
        }
    }

    /// Resolver with caller-supplied collaborators.
    pub fn with_parts(graph_builder: GraphBuilder, conflict_resolver: ConflictResolver) -> Self {
        Self {
            graph_builder,
            conflict_resolver,
        }
    }

    /// Resolves `template_id` against the current store contents.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when the id is not registered;
    /// [`EngineError::Inheritance`] when cycles are disallowed and an
    /// error-severity cycle is reachable from the target.
    pub fn resolve(
        &self,
        store: &TemplateStore,
        template_id: &str,
        options: &ResolutionOptions,
    ) -> EngineResult<InheritanceChainResult> {
        if !store.contains(template_id) {
            return Err(EngineError::NotFound {
                template_id: template_id.to_string(),
            });
        }

        let graph = self.graph_builder.build(store);

        if !options.allow_circular_dependencies
            && graph.has_cycle_from(template_id, options.max_depth)
        {
            return Err(EngineError::Inheritance {
                template_id: template_id.to_string(),
                reason: "circular dependency detected in inheritance chain".to_string(),
            });
        }

        let mut warnings = Vec::new();
        let chain_ids = self.collect_chain(&graph, template_id, options, &mut warnings);

        // Ascending priority: the highest-precedence template is merged
        // first and owns every parameter it writes.
        let mut chain_templates: Vec<&Template> = chain_ids
            .iter()
            .filter_map(|id| store.get(id))
            .collect();
        chain_templates.sort_by_key(|template| template.priority);

        let mut outcome = MergeAccumulator::new(
            template_id,
            options.strategy,
            options.max_depth,
            &self.conflict_resolver,
        );
        for template in &chain_templates {
            outcome.apply(template);
        }

        let (resolved, chain, conflicts, merge_warnings) = outcome.finish(&chain_templates);
        warnings.extend(merge_warnings);

        tracing::debug!(
            template_id,
            chain_length = chain.len(),
            conflicts = conflicts.len(),
            warnings = warnings.len(),
            "inheritance chain resolved"
        );

        Ok(InheritanceChainResult {
            template_id: template_id.to_string(),
            chain,
            resolved,
            conflicts,
            warnings,
        })
    }

    /// Ancestors-first traversal producing the raw (unsorted) chain.
    ///
    /// Iterative post-order walk: a node is appended only after all of its
    /// parents. A parent already on the current path is a cycle; the walk
    /// logs a warning and stops descending that branch. Unknown parents and
    /// branches deeper than `max_depth` are also warnings.
    fn collect_chain(
        &self,
        graph: &InheritanceGraph,
        template_id: &str,
        options: &ResolutionOptions,
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        let Some(start) = graph.index_of(template_id) else {
            return vec![template_id.to_string()];
        };

        let mut chain: Vec<String> = Vec::new();
        let mut included = vec![false; graph.len()];
        let mut on_path = vec![false; graph.len()];
        // (node, expanded)
        let mut stack: Vec<(usize, bool)> = vec![(start, false)];

        while let Some((node, expanded)) = stack.pop() {
            let node_id = &graph.node_at(node).template_id;
            if expanded {
                on_path[node] = false;
                if !included[node] {
                    included[node] = true;
                    chain.push(node_id.clone());
                }
                continue;
            }
            if included[node] {
                continue;
            }
            if on_path[node] {
                warnings.push(format!(
                    "Circular dependency broken at '{node_id}'; branch not expanded"
                ));
                tracing::warn!(template_id = %node_id, "circular dependency broken");
                continue;
            }

            let depth = stack.iter().filter(|(_, expanded)| *expanded).count();
            if depth >= options.max_depth {
                warnings.push(format!(
                    "Maximum inheritance depth {} reached at '{node_id}'; ancestors skipped",
                    options.max_depth
                ));
                if !included[node] {
                    included[node] = true;
                    chain.push(node_id.clone());
                }
                continue;
            }

            on_path[node] = true;
            stack.push((node, true));

            for missing in &graph.node_at(node).missing_parents {
                warnings.push(format!(
                    "Parent template '{missing}' of '{node_id}' not found in store"
                ));
            }
            for &parent in &graph.node_at(node).parents {
                if on_path[parent] {
                    warnings.push(format!(
                        "Circular dependency broken at '{}'; branch not expanded",
                        graph.node_at(parent).template_id
                    ));
                    continue;
                }
                if !included[parent] {
                    stack.push((parent, false));
                }
            }
        }

        chain
    }
}

impl Default for InheritanceResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates the merged template while walking the sorted chain.
struct MergeAccumulator<'a> {
    target_id: String,
    strategy: MergeStrategy,
    max_depth: usize,
    conflict_resolver: &'a ConflictResolver,
    merged: Template,
    /// parameter path → (first writer id, first writer priority)
    owners: std::collections::BTreeMap<String, (String, u32)>,
    condition_owners: std::collections::BTreeMap<String, String>,
    evaluation_owners: std::collections::BTreeMap<String, String>,
    function_owners: std::collections::BTreeMap<String, String>,
    conflicts: Vec<Conflict>,
    warnings: Vec<String>,
    applied: Vec<(String, u32, Vec<String>)>,
}

impl<'a> MergeAccumulator<'a> {
    fn new(
        target_id: &str,
        strategy: MergeStrategy,
        max_depth: usize,
        conflict_resolver: &'a ConflictResolver,
    ) -> Self {
        Self {
            target_id: target_id.to_string(),
            strategy,
            max_depth,
            conflict_resolver,
            merged: Template::new(target_id, 0),
            owners: Default::default(),
            condition_owners: Default::default(),
            evaluation_owners: Default::default(),
            function_owners: Default::default(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
            applied: Vec::new(),
        }
    }

    fn apply(&mut self, template: &Template) {
        let mut applied_parameters = Vec::new();

        for (path, incoming) in &template.configuration {
            if self.apply_parameter(path, incoming, template) {
                applied_parameters.push(path.clone());
            }
        }

        self.apply_conditions(template, &mut applied_parameters);
        self.apply_evaluations(template, &mut applied_parameters);
        self.apply_functions(template, &mut applied_parameters);
        self.apply_metadata(template);

        self.applied
            .push((template.id.clone(), template.priority, applied_parameters));
    }

    /// Returns true when the incoming template contributed to the path.
    fn apply_parameter(
        &mut self,
        path: &str,
        incoming: &ParameterValue,
        template: &Template,
    ) -> bool {
        let Some((owner_id, owner_priority)) = self.owners.get(path).cloned() else {
            self.merged
                .configuration
                .insert(path.to_string(), incoming.clone());
            self.owners
                .insert(path.to_string(), (template.id.clone(), template.priority));
            return true;
        };

        let existing = self
            .merged
            .configuration
            .get(path)
            .cloned()
            .unwrap_or(ParameterValue::Null);

        if existing == *incoming {
            // Same value; nothing to arbitrate.
            return false;
        }

        let owner = Contributor {
            template_id: owner_id,
            priority: owner_priority,
        };
        let incoming_from = Contributor {
            template_id: template.id.clone(),
            priority: template.priority,
        };
        let combined = self.combine(path, &existing, incoming, &owner, &incoming_from, 0);
        let contributed = combined != existing;
        self.merged.configuration.insert(path.to_string(), combined);
        contributed
    }

    /// Combines a colliding value pair at `path`.
    ///
    /// The parameter rule table is checked first at every level; rules
    /// always beat the global strategy. Object-object collisions descend
    /// per key so nested parameters are arbitrated at their own dotted
    /// path, exactly as the detector reports them. Each leaf-level
    /// disagreement is recorded as one conflict.
    fn combine(
        &mut self,
        path: &str,
        existing: &ParameterValue,
        incoming: &ParameterValue,
        owner: &Contributor,
        incoming_from: &Contributor,
        depth: usize,
    ) -> ParameterValue {
        if existing == incoming {
            return existing.clone();
        }

        let conflict_at = |value_existing: &ParameterValue, value_incoming: &ParameterValue| {
            Conflict::new(
                path,
                ConflictKind::Value,
                vec![
                    ConflictingValue {
                        template_id: owner.template_id.clone(),
                        priority: owner.priority,
                        value: value_existing.clone(),
                    },
                    ConflictingValue {
                        template_id: incoming_from.template_id.clone(),
                        priority: incoming_from.priority,
                        value: value_incoming.clone(),
                    },
                ],
            )
        };

        // Parameter rules always take precedence over the global strategy.
        if self.conflict_resolver.has_rule_for(path) {
            let conflict = conflict_at(existing, incoming);
            if let Some(resolved) = self
                .conflict_resolver
                .apply_parameter_rule(&conflict, self.strategy.into())
            {
                let value = resolved
                    .resolved_value
                    .clone()
                    .unwrap_or_else(|| existing.clone());
                self.conflicts.push(resolved);
                return value;
            }
        }

        if let (ParameterValue::Object(existing_map), ParameterValue::Object(incoming_map)) =
            (existing, incoming)
        {
            if depth >= self.max_depth {
                self.warnings.push(format!(
                    "Maximum merge depth {} reached at '{path}'; first-written subtree kept",
                    self.max_depth
                ));
                let mut conflict = conflict_at(existing, incoming);
                conflict.resolved_value = Some(existing.clone());
                conflict.resolution_strategy = Some(self.strategy.into());
                conflict.reason = Some(format!(
                    "Depth limit reached; subtree from '{}' kept over '{}'",
                    owner.template_id, incoming_from.template_id
                ));
                self.conflicts.push(conflict);
                return existing.clone();
            }

            let mut merged = serde_json::Map::new();
            for (key, existing_value) in existing_map {
                let child_path = format!("{path}.{key}");
                match incoming_map.get(key) {
                    Some(incoming_value) => {
                        let combined = self.combine(
                            &child_path,
                            existing_value,
                            incoming_value,
                            owner,
                            incoming_from,
                            depth + 1,
                        );
                        merged.insert(key.clone(), combined);
                    }
                    None => {
                        // Keys outside the intersection survive only when
                        // the strategy is not intersect.
                        if self.strategy != MergeStrategy::Intersect {
                            merged.insert(key.clone(), existing_value.clone());
                        }
                    }
                }
            }
            for (key, incoming_value) in incoming_map {
                if existing_map.contains_key(key) {
                    continue;
                }
                if self.strategy != MergeStrategy::Intersect {
                    // A parameter not already set; the later template may
                    // fill it in.
                    merged.insert(key.clone(), incoming_value.clone());
                }
            }
            return ParameterValue::Object(merged);
        }

        // Leaf-level disagreement.
        let (combined, reason) = match self.strategy {
            MergeStrategy::Override | MergeStrategy::Custom => (
                existing.clone(),
                format!(
                    "Template '{}' (priority {}) wrote '{path}' first; value from '{}' \
                     (priority {}) not applied",
                    owner.template_id,
                    owner.priority,
                    incoming_from.template_id,
                    incoming_from.priority
                ),
            ),
            MergeStrategy::Merge => (
                match (existing, incoming) {
                    (ParameterValue::Array(_), ParameterValue::Array(_)) => {
                        value::set_union(existing, incoming)
                    }
                    _ => existing.clone(),
                },
                format!(
                    "Merged '{path}' from '{}' (priority {}) into value owned by '{}'",
                    incoming_from.template_id, incoming_from.priority, owner.template_id
                ),
            ),
            MergeStrategy::Append => (
                value::append(existing, incoming),
                format!(
                    "Appended '{path}' from '{}' (priority {}) after value owned by '{}'",
                    incoming_from.template_id, incoming_from.priority, owner.template_id
                ),
            ),
            MergeStrategy::Intersect => (
                match (existing, incoming) {
                    (ParameterValue::Array(_), ParameterValue::Array(_)) => {
                        value::intersect(existing, incoming)
                    }
                    _ => incoming.clone(),
                },
                format!(
                    "Intersected '{path}' between '{}' and '{}' (priority {})",
                    owner.template_id, incoming_from.template_id, incoming_from.priority
                ),
            ),
        };

        let mut conflict = conflict_at(existing, incoming);
        conflict.resolved_value = Some(combined.clone());
        conflict.resolution_strategy = Some(self.strategy.into());
        conflict.reason = Some(reason);
        self.conflicts.push(conflict);

        combined
    }

    fn apply_conditions(&mut self, template: &Template, applied: &mut Vec<String>) {
        for (key, incoming) in &template.conditions {
            match self.condition_owners.get(key) {
                None => {
                    self.merged.conditions.insert(key.clone(), incoming.clone());
                    self.condition_owners
                        .insert(key.clone(), template.id.clone());
                    applied.push(format!("$cond.{key}"));
                }
                Some(owner_id) => {
                    let existing = &self.merged.conditions[key];
                    if existing == incoming {
                        continue;
                    }
                    let mut conflict = Conflict::new(
                        key.clone(),
                        ConflictKind::Conditional,
                        vec![
                            ConflictingValue {
                                template_id: owner_id.clone(),
                                priority: self.priority_of(owner_id),
                                value: serde_json::to_value(existing)
                                    .unwrap_or(ParameterValue::Null),
                            },
                            ConflictingValue {
                                template_id: template.id.clone(),
                                priority: template.priority,
                                value: serde_json::to_value(incoming)
                                    .unwrap_or(ParameterValue::Null),
                            },
                        ],
                    );
                    conflict.resolution_strategy = Some(self.strategy.into());
                    conflict.reason = Some(format!(
                        "Condition '{key}' kept from '{owner_id}'; lower-precedence logic from \
                         '{}' not applied",
                        template.id
                    ));
                    self.conflicts.push(conflict);
                }
            }
        }
    }

    fn apply_evaluations(&mut self, template: &Template, applied: &mut Vec<String>) {
        for (key, incoming) in &template.evaluations {
            match self.evaluation_owners.get(key) {
                None => {
                    self.merged.evaluations.insert(key.clone(), incoming.clone());
                    self.evaluation_owners
                        .insert(key.clone(), template.id.clone());
                    applied.push(format!("$eval.{key}"));
                }
                Some(owner_id) => {
                    let existing = &self.merged.evaluations[key];
                    if existing == incoming {
                        continue;
                    }
                    let mut conflict = Conflict::new(
                        key.clone(),
                        ConflictKind::Conditional,
                        vec![
                            ConflictingValue {
                                template_id: owner_id.clone(),
                                priority: self.priority_of(owner_id),
                                value: serde_json::to_value(existing)
                                    .unwrap_or(ParameterValue::Null),
                            },
                            ConflictingValue {
                                template_id: template.id.clone(),
                                priority: template.priority,
                                value: serde_json::to_value(incoming)
                                    .unwrap_or(ParameterValue::Null),
                            },
                        ],
                    );
                    conflict.resolution_strategy = Some(self.strategy.into());
                    conflict.reason = Some(format!(
                        "Evaluation '{key}' kept from '{owner_id}'; expression from '{}' not \
                         applied",
                        template.id
                    ));
                    self.conflicts.push(conflict);
                }
            }
        }
    }

    fn apply_functions(&mut self, template: &Template, applied: &mut Vec<String>) {
        for incoming in &template.custom_functions {
            match self.function_owners.get(&incoming.name) {
                None => {
                    self.merged.custom_functions.push(incoming.clone());
                    self.function_owners
                        .insert(incoming.name.clone(), template.id.clone());
                    applied.push(format!("$custom.{}", incoming.name));
                }
                Some(owner_id) => {
                    let existing = self
                        .merged
                        .custom_functions
                        .iter()
                        .find(|function| function.name == incoming.name)
                        .cloned();
                    if existing.as_ref() == Some(incoming) {
                        continue;
                    }
                    let mut conflict = Conflict::new(
                        incoming.name.clone(),
                        ConflictKind::Function,
                        vec![
                            ConflictingValue {
                                template_id: owner_id.clone(),
                                priority: self.priority_of(owner_id),
                                value: serde_json::to_value(&existing)
                                    .unwrap_or(ParameterValue::Null),
                            },
                            ConflictingValue {
                                template_id: template.id.clone(),
                                priority: template.priority,
                                value: serde_json::to_value(incoming)
                                    .unwrap_or(ParameterValue::Null),
                            },
                        ],
                    );
                    conflict.resolution_strategy = Some(self.strategy.into());
                    conflict.reason = Some(format!(
                        "Function '{}' kept from '{owner_id}'; body from '{}' not applied",
                        incoming.name, template.id
                    ));
                    self.conflicts.push(conflict);
                }
            }
        }
    }

    fn apply_metadata(&mut self, template: &Template) {
        for tag in &template.tags {
            if !self.merged.tags.contains(tag) {
                self.merged.tags.push(tag.clone());
            }
        }
        for author in &template.authors {
            if !self.merged.authors.contains(author) {
                self.merged.authors.push(author.clone());
            }
        }
        for rule in &template.validation_rules {
            if !self.merged.validation_rules.contains(rule) {
                self.merged.validation_rules.push(rule.clone());
            }
        }
        // Highest-precedence definer wins scalar metadata; chain order is
        // ascending priority, so first writer keeps the field.
        if self.merged.version.is_none() {
            self.merged.version = template.version.clone();
        }
        if self.merged.description.is_none() {
            self.merged.description = template.description.clone();
        }
        if self.merged.environment.is_none() {
            self.merged.environment = template.environment.clone();
        }
    }

    fn priority_of(&self, template_id: &str) -> u32 {
        self.applied
            .iter()
            .find(|(id, _, _)| id == template_id)
            .map(|(_, priority, _)| *priority)
            .unwrap_or(0)
    }

    fn finish(
        mut self,
        chain_templates: &[&Template],
    ) -> (Template, Vec<ChainLink>, Vec<Conflict>, Vec<String>) {
        if let Some(target) = chain_templates
            .iter()
            .find(|template| template.id == self.target_id)
        {
            self.merged.priority = target.priority;
            self.merged.created = target.created;
        }

        let applied_at = Utc::now();
        let chain = self
            .applied
            .into_iter()
            .map(|(template_id, priority, applied_parameters)| ChainLink {
                template_id,
                priority,
                applied_at,
                applied_parameters,
            })
            .collect();

        (self.merged, chain, self.conflicts, self.warnings)
    }
}

/// Identifies which template contributed a value during combination.
struct Contributor {
    template_id: String,
    priority: u32,
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
