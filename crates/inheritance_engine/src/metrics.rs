//! Processing metrics.
//!
//! Counters the engine keeps while operating: how many templates were
//! processed, how the cache behaved, and per-template resolution costs.
//! Metrics are informational; nothing in the engine branches on them.

use std::collections::HashMap;

/// Per-template processing counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMetrics {
    /// Times this template was resolved (cache hits included).
    pub resolutions: u64,
    /// Processing time of the last uncached resolution.
    pub last_processing_time_ms: u64,
    /// Conflicts recorded across all resolutions of this template.
    pub total_conflicts: u64,
}

/// Engine-wide processing counters.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    pub templates_registered: u64,
    pub templates_resolved: u64,
    pub templates_merged: u64,
    pub conflicts_detected: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    per_template: HashMap<String, TemplateMetrics>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one template, if it has been processed.
    pub fn for_template(&self, template_id: &str) -> Option<&TemplateMetrics> {
        self.per_template.get(template_id)
    }

    /// Records one resolution of a template.
    pub fn record_resolution(
        &mut self,
        template_id: &str,
        processing_time_ms: u64,
        conflicts: u64,
        cache_hit: bool,
    ) {
        self.templates_resolved += 1;
        if cache_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        self.conflicts_detected += conflicts;

        let entry = self.per_template.entry(template_id.to_string()).or_default();
        entry.resolutions += 1;
        entry.total_conflicts += conflicts;
        if !cache_hit {
            entry.last_processing_time_ms = processing_time_ms;
        }
    }

    /// Records a registration.
    pub fn record_registration(&mut self, template_id: &str) {
        self.templates_registered += 1;
        self.per_template.entry(template_id.to_string()).or_default();
    }

    /// Records a merge and its conflict count.
    pub fn record_merge(&mut self, conflicts: u64) {
        self.templates_merged += 1;
        self.conflicts_detected += conflicts;
    }

    /// Drops a deleted template's counters.
    pub fn forget_template(&mut self, template_id: &str) {
        self.per_template.remove(template_id);
    }

    /// Fraction of resolutions served from cache, 0.0 when none ran.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
