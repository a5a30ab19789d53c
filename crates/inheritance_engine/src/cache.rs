//! Bounded, time-expiring cache for resolved inheritance chains.
//!
//! Entries are keyed by `(template id, serialized resolution options)` and
//! evicted two ways: least-recently-used when the cache is full, and by
//! age when an entry outlives its TTL. A successful lookup refreshes the
//! entry's age.
//!
//! Each entry remembers every template id its chain referenced, and a
//! reverse index (template id → cache keys) is maintained incrementally on
//! insert. Invalidating a mutated template is then a lookup plus targeted
//! removals instead of a scan over the whole cache.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::resolver::{InheritanceChainResult, ResolutionOptions};

/// Default maximum number of cached chains.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default entry time-to-live: 15 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry {
    result: InheritanceChainResult,
    /// Template ids the cached chain depends on.
    referenced: Vec<String>,
    last_access: Instant,
    /// Monotonic recency stamp; smallest = least recently used.
    recency: u64,
}

/// LRU + TTL cache with reverse-index invalidation.
pub struct ResolutionCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    reverse: HashMap<String, HashSet<String>>,
    counter: u64,
}

impl ResolutionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
            reverse: HashMap::new(),
            counter: 0,
        }
    }

    /// Cache key for a resolution request.
    pub fn key_for(template_id: &str, options: &ResolutionOptions) -> String {
        format!("{template_id}|{}", options.cache_key())
    }

    /// Looks up a cached result, refreshing its age on hit.
    ///
    /// Expired entries are removed on the way and reported as misses.
    pub fn get(&mut self, key: &str) -> Option<InheritanceChainResult> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => now.duration_since(entry.last_access) >= self.ttl,
            None => return None,
        };
        if expired {
            tracing::debug!(key, "cache entry expired");
            self.remove(key);
            return None;
        }

        self.counter += 1;
        let counter = self.counter;
        let entry = self.entries.get_mut(key).expect("checked above");
        entry.last_access = now;
        entry.recency = counter;
        Some(entry.result.clone())
    }

    /// Inserts a resolved chain, evicting the least recently used entry
    /// when full.
    ///
    /// `referenced` lists every template id the chain depends on (the
    /// target and all its applied ancestors); the reverse index is updated
    /// from it.
    pub fn insert(&mut self, key: String, result: InheritanceChainResult, referenced: Vec<String>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_lru();
        }
        if self.entries.contains_key(&key) {
            self.remove(&key);
        }

        for template_id in &referenced {
            self.reverse
                .entry(template_id.clone())
                .or_default()
                .insert(key.clone());
        }
        self.counter += 1;
        self.entries.insert(
            key,
            CacheEntry {
                result,
                referenced,
                last_access: Instant::now(),
                recency: self.counter,
            },
        );
    }

    /// Removes every cached chain that references `template_id`.
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate_template(&mut self, template_id: &str) -> usize {
        let Some(keys) = self.reverse.remove(template_id) else {
            return 0;
        };
        let mut dropped = 0;
        for key in keys {
            if self.remove(&key) {
                dropped += 1;
            }
        }
        tracing::debug!(template_id, dropped, "cache invalidated");
        dropped
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.reverse.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        for template_id in &entry.referenced {
            if let Some(keys) = self.reverse.get_mut(template_id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.reverse.remove(template_id);
                }
            }
        }
        true
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.recency)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "evicting least recently used cache entry");
            self.remove(&key);
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
