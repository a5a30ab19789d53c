//! In-memory template store.
//!
//! The store is the exclusive owner of registered [`Template`] records.
//! Resolution and merge code only ever borrow from it; merged results are
//! always freshly constructed objects, never mutations of stored templates.
//!
//! Writes (`insert`/`remove`) are expected to be serialized by the caller;
//! the store provides no internal locking.

use std::collections::HashMap;

use crate::template::Template;

/// Keyed map of template id → template record.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a template, returning the previous record when the id was
    /// already registered.
    ///
    /// Re-registration is not an error: the existing template is replaced
    /// and a warning is logged.
    pub fn insert(&mut self, template: Template) -> Option<Template> {
        let previous = self.templates.insert(template.id.clone(), template);
        if let Some(existing) = &previous {
            tracing::warn!(
                template_id = %existing.id,
                "overwriting previously registered template"
            );
        }
        previous
    }

    /// Looks up a template by id.
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Removes a template, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Template> {
        self.templates.remove(id)
    }

    /// True when the id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Ids of all registered templates, in unspecified order.
    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// Iterates over all registered templates.
    pub fn all(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
