//! Test utilities for engine tests.
//!
//! Provides a fluent [`TemplateBuilder`] and store helpers so scenario
//! tests can assemble template hierarchies without repeating struct
//! plumbing.

use chrono::Utc;
use serde_json::Value;

use inheritance_engine::template::{ConditionBlock, CustomFunction, Evaluation};
use inheritance_engine::{Template, TemplateStore};

/// Fluent builder for test templates.
///
/// # Examples
///
/// ```rust
/// use test_utils::TemplateBuilder;
/// use serde_json::json;
///
/// let template = TemplateBuilder::new("urban", 20)
///     .inherits("base")
///     .parameter("cell.qRxLevMin", json!(-110))
///     .tag("urban")
///     .build();
///
/// assert_eq!(template.priority, 20);
/// ```
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    pub fn new(id: &str, priority: u32) -> Self {
        let mut template = Template::new(id, priority);
        template.created = Some(Utc::now());
        Self { template }
    }

    /// Adds a parent template id.
    pub fn inherits(mut self, parent_id: &str) -> Self {
        self.template.inherits_from.push(parent_id.to_string());
        self
    }

    /// Sets one configuration parameter.
    pub fn parameter(mut self, path: &str, value: Value) -> Self {
        self.template
            .configuration
            .insert(path.to_string(), value);
        self
    }

    /// Adds a conditional block.
    pub fn condition(mut self, key: &str, predicate: &str, then_branch: Value) -> Self {
        self.template.conditions.insert(
            key.to_string(),
            ConditionBlock {
                predicate: predicate.to_string(),
                then_branch,
                else_branch: None,
            },
        );
        self
    }

    /// Adds an evaluation block.
    pub fn evaluation(mut self, key: &str, expression: &str) -> Self {
        self.template.evaluations.insert(
            key.to_string(),
            Evaluation {
                expression: expression.to_string(),
                arguments: Default::default(),
            },
        );
        self
    }

    /// Adds a custom function definition.
    pub fn function(mut self, name: &str, args: &[&str], body: &[&str]) -> Self {
        self.template.custom_functions.push(CustomFunction {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            body: body.iter().map(|line| line.to_string()).collect(),
            description: None,
        });
        self
    }

    /// Adds a classification tag.
    pub fn tag(mut self, tag: &str) -> Self {
        self.template.tags.push(tag.to_string());
        self
    }

    /// Adds an author.
    pub fn author(mut self, author: &str) -> Self {
        self.template.authors.push(author.to_string());
        self
    }

    /// Sets the deployment environment.
    pub fn environment(mut self, environment: &str) -> Self {
        self.template.environment = Some(environment.to_string());
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}

/// Builds a store from a template list.
pub fn store_with(templates: Vec<Template>) -> TemplateStore {
    let mut store = TemplateStore::new();
    for template in templates {
        store.insert(template);
    }
    store
}

/// The canonical two-template fixture: `base` (priority 9) and `urban`
/// (priority 20, inherits from base) disagreeing on parameter `b`.
pub fn base_and_urban() -> Vec<Template> {
    vec![
        TemplateBuilder::new("base", 9)
            .parameter("a", serde_json::json!(1))
            .parameter("b", serde_json::json!(2))
            .build(),
        TemplateBuilder::new("urban", 20)
            .inherits("base")
            .parameter("b", serde_json::json!(3))
            .parameter("c", serde_json::json!(4))
            .build(),
    ]
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
