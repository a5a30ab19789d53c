//! Priority template engine.
//!
//! The engine owns the template store and wires the resolver, merger,
//! conflict detector, cache, validator, and event publisher together. A
//! template id moves through a small lifecycle: unregistered → registered
//! → (resolved or merge participant) → deleted; there are no other states.
//!
//! # Concurrency contract
//!
//! The engine targets a single-threaded cooperative model. Public
//! operations are async, but the only suspension points are calls into the
//! validator and event publisher; the resolution, merge, and detection
//! algorithms never suspend mid-computation. Writes (`register_template`,
//! `delete_template`) must be serialized by the caller; the engine
//! provides no internal locking, and mutating a template concurrently
//! with its resolution is undefined behavior at the contract level.
//! Cancellation is not supported; callers wanting a timeout race the call
//! externally.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::basic_validator::BasicTemplateValidator;
use crate::cache::{ResolutionCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::detector::{ConflictDetector, ConflictReport};
use crate::errors::{EngineError, EngineResult};
use crate::events::{EngineEvent, EngineEventKind, EventPublisher, NullEventPublisher};
use crate::merger::{MergeOutcome, TemplateMerger};
use crate::metrics::EngineMetrics;
use crate::resolution::ResolutionStrategy;
use crate::resolver::{InheritanceChainResult, InheritanceResolver, ResolutionOptions};
use crate::store::TemplateStore;
use crate::template::Template;
use crate::validator::{TemplateValidator, ValidationReport};
use crate::value::{self, ParameterValue};

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum number of cached inheritance chains.
    pub cache_capacity: usize,
    /// Cached chain time-to-live; access refreshes age.
    pub cache_ttl: Duration,
    /// Depth limit for inheritance walks and configuration recursion.
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_depth: value::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Top-level façade over the template inheritance machinery.
pub struct PriorityTemplateEngine {
    store: TemplateStore,
    resolver: InheritanceResolver,
    merger: TemplateMerger,
    detector: ConflictDetector,
    cache: ResolutionCache,
    validator: Arc<dyn TemplateValidator>,
    events: Arc<dyn EventPublisher>,
    metrics: EngineMetrics,
    options: EngineOptions,
}

impl PriorityTemplateEngine {
    /// Engine with caller-supplied collaborators.
    pub fn new(
        validator: Arc<dyn TemplateValidator>,
        events: Arc<dyn EventPublisher>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store: TemplateStore::new(),
            resolver: InheritanceResolver::new(),
            merger: TemplateMerger::new(),
            detector: ConflictDetector::with_max_depth(options.max_depth),
            cache: ResolutionCache::new(options.cache_capacity, options.cache_ttl),
            validator,
            events,
            metrics: EngineMetrics::new(),
            options,
        }
    }

    /// Engine wired with the basic validator and no event delivery.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(BasicTemplateValidator::new()),
            Arc::new(NullEventPublisher::new()),
            EngineOptions::default(),
        )
    }

    /// Registers a template.
    ///
    /// The template is validated first and not stored when validation
    /// fails. Registration invalidates every cached chain that references
    /// the id, so stale resolutions cannot be served afterwards.
    /// Re-registering an id overwrites the previous record with a logged
    /// warning.
    ///
    /// Returns the validation report so callers can surface warnings.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] when the validator reports an
    /// error-severity issue.
    pub async fn register_template(&mut self, template: Template) -> EngineResult<ValidationReport> {
        let report = self.validator.validate(&template).await?;
        if !report.is_valid() {
            let issues: Vec<_> = report.errors().into_iter().cloned().collect();
            self.events
                .publish(
                    EngineEvent::new(EngineEventKind::ValidationFailed, &template.id)
                        .with_error(format!("{} validation error(s)", issues.len())),
                )
                .await;
            return Err(EngineError::Validation {
                template_id: template.id,
                issues,
            });
        }

        let template_id = template.id.clone();
        let priority = template.priority;
        self.store.insert(template);
        self.cache.invalidate_template(&template_id);
        self.metrics.record_registration(&template_id);
        self.events
            .publish(
                EngineEvent::new(EngineEventKind::TemplateRegistered, &template_id)
                    .with_data(json!({ "priority": priority })),
            )
            .await;

        Ok(report)
    }

    /// Resolves a template's inheritance chain with default options.
    pub async fn resolve_inheritance(
        &mut self,
        template_id: &str,
    ) -> EngineResult<InheritanceChainResult> {
        let options = ResolutionOptions {
            max_depth: self.options.max_depth,
            ..Default::default()
        };
        self.resolve_inheritance_with(template_id, options).await
    }

    /// Resolves a template's inheritance chain.
    ///
    /// Results are cached by `(template id, options)`; a cache hit is
    /// returned without re-running resolution and refreshes the entry's
    /// age.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown ids,
    /// [`EngineError::Inheritance`] for disallowed cycles.
    pub async fn resolve_inheritance_with(
        &mut self,
        template_id: &str,
        options: ResolutionOptions,
    ) -> EngineResult<InheritanceChainResult> {
        let key = ResolutionCache::key_for(template_id, &options);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(template_id, "inheritance chain served from cache");
            self.metrics
                .record_resolution(template_id, 0, hit.conflicts.len() as u64, true);
            return Ok(hit);
        }

        let started = Instant::now();
        let result = self.resolver.resolve(&self.store, template_id, &options)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut referenced: Vec<String> = result
            .chain
            .iter()
            .map(|link| link.template_id.clone())
            .collect();
        if !referenced.iter().any(|id| id == template_id) {
            referenced.push(template_id.to_string());
        }
        self.cache.insert(key, result.clone(), referenced);

        self.metrics
            .record_resolution(template_id, elapsed_ms, result.conflicts.len() as u64, false);
        self.events
            .publish(
                EngineEvent::new(EngineEventKind::TemplateResolved, template_id)
                    .with_data(json!({
                        "chain_length": result.chain.len(),
                        "conflicts": result.conflicts.len(),
                        "warnings": result.warnings.len(),
                    }))
                    .with_processing_time(elapsed_ms),
            )
            .await;

        Ok(result)
    }

    /// Merges the given templates and registers the result.
    ///
    /// Ids missing from the store are skipped with a logged warning; at
    /// least one id must resolve. Every participating template is
    /// validated before merging. The merged template is stored under its
    /// generated id and is immediately resolvable.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoTemplatesFound`] when none of the ids exist;
    /// [`EngineError::Validation`] when a participant fails validation;
    /// [`EngineError::Conflict`] under
    /// [`ResolutionStrategy::FailOnConflict`].
    pub async fn merge_templates(
        &mut self,
        template_ids: &[String],
        strategy: ResolutionStrategy,
    ) -> EngineResult<MergeOutcome> {
        let mut participants: Vec<Template> = Vec::new();
        for template_id in template_ids {
            match self.store.get(template_id) {
                Some(template) => participants.push(template.clone()),
                None => {
                    tracing::warn!(%template_id, "merge participant not found; skipped");
                }
            }
        }
        if participants.is_empty() {
            return Err(EngineError::NoTemplatesFound {
                requested: template_ids.to_vec(),
            });
        }

        for participant in &participants {
            let report = self.validator.validate(participant).await?;
            if !report.is_valid() {
                return Err(EngineError::Validation {
                    template_id: participant.id.clone(),
                    issues: report.errors().into_iter().cloned().collect(),
                });
            }
        }

        let started = Instant::now();
        let outcome = self.merger.merge(&participants, strategy)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let merged_id = outcome.template.id.clone();
        self.store.insert(outcome.template.clone());
        self.cache.invalidate_template(&merged_id);
        self.metrics.record_registration(&merged_id);
        self.metrics.record_merge(outcome.conflicts.len() as u64);
        self.events
            .publish(
                EngineEvent::new(EngineEventKind::TemplateMerged, &merged_id)
                    .with_data(json!({
                        "sources": outcome.template.inherits_from.clone(),
                        "conflicts": outcome.conflicts.len(),
                    }))
                    .with_processing_time(elapsed_ms),
            )
            .await;

        Ok(outcome)
    }

    /// Creates and registers a variant of an existing template.
    ///
    /// The variant inherits from the base and carries the given parameter
    /// overrides; resolution folds the base back in by the usual rules.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when the base id is unknown, plus any
    /// registration error.
    pub async fn generate_variant(
        &mut self,
        base_id: &str,
        variant_id: &str,
        priority: u32,
        overrides: BTreeMap<String, ParameterValue>,
    ) -> EngineResult<Template> {
        if !self.store.contains(base_id) {
            return Err(EngineError::NotFound {
                template_id: base_id.to_string(),
            });
        }

        let mut variant = Template::new(variant_id, priority);
        variant.inherits_from.push(base_id.to_string());
        variant.configuration = overrides;
        variant.description = Some(format!("Variant of '{base_id}'"));

        self.register_template(variant.clone()).await?;
        Ok(variant)
    }

    /// Deletes a template, purging every cached chain that references it.
    ///
    /// Returns whether anything was deleted.
    pub async fn delete_template(&mut self, template_id: &str) -> bool {
        if self.store.remove(template_id).is_none() {
            return false;
        }
        self.cache.invalidate_template(template_id);
        self.metrics.forget_template(template_id);
        self.events
            .publish(EngineEvent::new(
                EngineEventKind::TemplateDeleted,
                template_id,
            ))
            .await;
        true
    }

    /// Runs the standalone conflict detector over the given templates.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for the first unknown id.
    pub fn detect_conflicts(&mut self, template_ids: &[String]) -> EngineResult<ConflictReport> {
        let mut templates: Vec<Template> = Vec::with_capacity(template_ids.len());
        for template_id in template_ids {
            match self.store.get(template_id) {
                Some(template) => templates.push(template.clone()),
                None => {
                    return Err(EngineError::NotFound {
                        template_id: template_id.clone(),
                    })
                }
            }
        }
        Ok(self.detector.detect(&templates))
    }

    /// Validates a template without registering it.
    pub async fn validate_template(&self, template: &Template) -> EngineResult<ValidationReport> {
        self.validator.validate(template).await
    }

    /// Looks up a stored template.
    pub fn get_template(&self, template_id: &str) -> Option<&Template> {
        self.store.get(template_id)
    }

    /// Number of registered templates.
    pub fn template_count(&self) -> usize {
        self.store.len()
    }

    /// Drops every cached chain.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Processing counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
