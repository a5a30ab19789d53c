//! Conflict detection across a set of templates.
//!
//! Detection is a pure function of its input list: the same templates in
//! the same order always produce the same report. Five passes run
//! independently and their findings are concatenated:
//!
//! 1. **Parameter** - flattened configuration paths with more than one
//!    distinct value.
//! 2. **Structural** - disagreement on the overall configuration shape.
//! 3. **Conditional** - same condition key with differing logic.
//! 4. **Function** - same custom-function name with differing bodies.
//! 5. **Metadata** - differing version/environment/authors/tags.
//!
//! The only internal state is a historical pattern counter used for
//! diagnostics; it never influences the report content.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::conflict::{Conflict, ConflictKind, ConflictingValue};
use crate::template::Template;
use crate::value::{self, ParameterValue};

/// Detection output: the conflicts plus non-fatal processing warnings
/// (depth-limit cuts and similar).
#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
}

impl ConflictReport {
    /// True when no conflicts were found.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Scans template sets for disagreements.
#[derive(Debug, Default)]
pub struct ConflictDetector {
    max_depth: usize,
    /// Times each parameter path has been seen conflicting, across calls.
    /// Diagnostics only.
    history: HashMap<String, u64>,
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self {
            max_depth: value::DEFAULT_MAX_DEPTH,
            history: HashMap::new(),
        }
    }

    /// Detector with a custom recursion depth limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            history: HashMap::new(),
        }
    }

    /// Runs every pass over the given templates.
    pub fn detect(&mut self, templates: &[Template]) -> ConflictReport {
        let mut report = ConflictReport::default();
        if templates.len() < 2 {
            return report;
        }

        self.detect_parameter_conflicts(templates, &mut report);
        self.detect_structural_conflicts(templates, &mut report);
        self.detect_conditional_conflicts(templates, &mut report);
        self.detect_function_conflicts(templates, &mut report);
        self.detect_metadata_conflicts(templates, &mut report);

        for conflict in &report.conflicts {
            *self.history.entry(conflict.parameter_path.clone()).or_insert(0) += 1;
        }
        tracing::debug!(
            templates = templates.len(),
            conflicts = report.conflicts.len(),
            "conflict detection finished"
        );

        report
    }

    /// Parameter pass only, used by the merger which handles conditions and
    /// functions through its own collision accounting.
    pub fn detect_parameter_conflicts_only(&mut self, templates: &[Template]) -> ConflictReport {
        let mut report = ConflictReport::default();
        if templates.len() < 2 {
            return report;
        }
        self.detect_parameter_conflicts(templates, &mut report);
        report
    }

    /// Times a path has been reported as conflicting by this detector.
    pub fn times_seen(&self, path: &str) -> u64 {
        self.history.get(path).copied().unwrap_or(0)
    }

    fn detect_parameter_conflicts(&self, templates: &[Template], report: &mut ConflictReport) {
        // path → contributions, insertion-ordered by path for determinism.
        let mut by_path: BTreeMap<String, Vec<ConflictingValue>> = BTreeMap::new();

        for template in templates {
            for (parameter, value) in &template.configuration {
                let (flattened, warnings) = value::flatten_paths(parameter, value, self.max_depth);
                report.warnings.extend(
                    warnings
                        .into_iter()
                        .map(|warning| format!("{}: {warning}", template.id)),
                );
                for (path, leaf) in flattened {
                    by_path.entry(path).or_default().push(ConflictingValue {
                        template_id: template.id.clone(),
                        priority: template.priority,
                        value: leaf,
                    });
                }
            }
        }

        for (path, contributions) in by_path {
            if contributions.len() < 2 {
                continue;
            }
            let first = &contributions[0].value;
            if contributions.iter().all(|c| &c.value == first) {
                continue;
            }

            let kind = classify_parameter_conflict(&contributions);
            report.conflicts.push(Conflict::new(path, kind, contributions));
        }
    }

    fn detect_structural_conflicts(&self, templates: &[Template], report: &mut ConflictReport) {
        let shapes: Vec<ParameterValue> = templates
            .iter()
            .map(|template| {
                let as_object: serde_json::Map<String, ParameterValue> = template
                    .configuration
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                value::shape_signature(&ParameterValue::Object(as_object), self.max_depth)
            })
            .collect();

        let first = &shapes[0];
        if shapes.iter().all(|shape| shape == first) {
            return;
        }

        let contributions = templates
            .iter()
            .zip(shapes)
            .map(|(template, shape)| ConflictingValue {
                template_id: template.id.clone(),
                priority: template.priority,
                value: shape,
            })
            .collect();
        report.conflicts.push(Conflict::new(
            "$structure",
            ConflictKind::Structure,
            contributions,
        ));
    }

    fn detect_conditional_conflicts(&self, templates: &[Template], report: &mut ConflictReport) {
        let mut by_key: BTreeMap<String, Vec<ConflictingValue>> = BTreeMap::new();

        for template in templates {
            for (key, condition) in &template.conditions {
                let serialized =
                    serde_json::to_value(condition).unwrap_or(ParameterValue::Null);
                by_key.entry(key.clone()).or_default().push(ConflictingValue {
                    template_id: template.id.clone(),
                    priority: template.priority,
                    value: serialized,
                });
            }
        }

        for (key, contributions) in by_key {
            if contributions.len() < 2 {
                continue;
            }
            let first = &contributions[0].value;
            if contributions.iter().all(|c| &c.value == first) {
                continue;
            }
            report
                .conflicts
                .push(Conflict::new(key, ConflictKind::Conditional, contributions));
        }
    }

    fn detect_function_conflicts(&self, templates: &[Template], report: &mut ConflictReport) {
        let mut by_name: BTreeMap<String, Vec<ConflictingValue>> = BTreeMap::new();

        for template in templates {
            for function in &template.custom_functions {
                let serialized =
                    serde_json::to_value(function).unwrap_or(ParameterValue::Null);
                by_name
                    .entry(function.name.clone())
                    .or_default()
                    .push(ConflictingValue {
                        template_id: template.id.clone(),
                        priority: template.priority,
                        value: serialized,
                    });
            }
        }

        for (name, contributions) in by_name {
            if contributions.len() < 2 {
                continue;
            }
            let first = &contributions[0].value;
            if contributions.iter().all(|c| &c.value == first) {
                continue;
            }
            report
                .conflicts
                .push(Conflict::new(name, ConflictKind::Function, contributions));
        }
    }

    fn detect_metadata_conflicts(&self, templates: &[Template], report: &mut ConflictReport) {
        let fields: [(&str, fn(&Template) -> Option<ParameterValue>, &str); 4] = [
            ("version", metadata_version, "highest_priority"),
            ("environment", metadata_environment, "highest_priority"),
            ("authors", metadata_authors, "merge"),
            ("tags", metadata_tags, "merge"),
        ];

        for (field, extract, suggestion) in fields {
            let contributions: Vec<ConflictingValue> = templates
                .iter()
                .filter_map(|template| {
                    extract(template).map(|value| ConflictingValue {
                        template_id: template.id.clone(),
                        priority: template.priority,
                        value,
                    })
                })
                .collect();
            if contributions.len() < 2 {
                continue;
            }
            let first = &contributions[0].value;
            if contributions.iter().all(|c| &c.value == first) {
                continue;
            }

            let mut conflict = Conflict::new(
                format!("$meta.{field}"),
                ConflictKind::Metadata,
                contributions,
            );
            conflict.reason = Some(format!(
                "Metadata field '{field}' differs; suggested resolution: {suggestion}"
            ));
            report.conflicts.push(conflict);
        }
    }
}

fn classify_parameter_conflict(contributions: &[ConflictingValue]) -> ConflictKind {
    let first_type = value::type_name(&contributions[0].value);
    let same_type = contributions
        .iter()
        .all(|c| value::type_name(&c.value) == first_type);
    if !same_type {
        return ConflictKind::Type;
    }
    if contributions.iter().all(|c| c.value.is_object()) {
        return ConflictKind::Structure;
    }
    ConflictKind::Value
}

fn metadata_version(template: &Template) -> Option<ParameterValue> {
    template.version.clone().map(ParameterValue::String)
}

fn metadata_environment(template: &Template) -> Option<ParameterValue> {
    template.environment.clone().map(ParameterValue::String)
}

fn metadata_authors(template: &Template) -> Option<ParameterValue> {
    if template.authors.is_empty() {
        return None;
    }
    Some(ParameterValue::Array(
        template
            .authors
            .iter()
            .map(|author| ParameterValue::String(author.clone()))
            .collect(),
    ))
}

fn metadata_tags(template: &Template) -> Option<ParameterValue> {
    if template.tags.is_empty() {
        return None;
    }
    Some(ParameterValue::Array(
        template
            .tags
            .iter()
            .map(|tag| ParameterValue::String(tag.clone()))
            .collect(),
    ))
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
