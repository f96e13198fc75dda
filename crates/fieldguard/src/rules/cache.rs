//! Active rule cache.
//!
//! Holds a snapshot of every active rule, loaded lazily from the rule store on
//! first access and dropped as a whole on invalidation. There is no expiry.
//!
//! # Concurrency
//!
//! Reads are lock-free through [`ArcSwap`]. Every snapshot carries a
//! generation that [`RuleCache::invalidate`] bumps. A load installs its result
//! only if the state it started from is still current, so a load that raced
//! with an invalidation never resurrects stale rules. Its caller still gets
//! what was loaded.
//!
//! # Failure
//!
//! A store failure yields an empty rule set that is not cached; the next
//! access retries the store. Field security therefore fails open while the
//! store is unreachable.
//!
//! # Example
//!
//! ```ignore
//! use fieldguard::rules::RuleCache;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn RuleStore> = /* ... */;
//! let cache = RuleCache::new(store, "fieldguard:rules");
//!
//! let rules = cache.get_rules_for("App\\Models\\User");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::config::DEFAULT_CACHE_KEY;
use crate::rules::rule::Rule;
use crate::rules::store::RuleStore;

// =============================================================================
// Snapshot
// =============================================================================

/// Cache state at one point in time.
#[derive(Debug)]
struct Snapshot {
    /// Incremented on every invalidation.
    generation: u64,

    /// Loaded rules; `None` while cold.
    rules: Option<Arc<[Rule]>>,
}

// =============================================================================
// Rule Cache
// =============================================================================

/// In-memory snapshot of the active rule set.
pub struct RuleCache {
    /// Underlying rule store.
    store: Arc<dyn RuleStore>,

    /// Key the snapshot is cached under.
    cache_key: String,

    /// Current snapshot.
    state: ArcSwap<Snapshot>,

    hits: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    invalidations: AtomicU64,
}

impl RuleCache {
    /// Create a cold cache over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RuleStore>, cache_key: impl Into<String>) -> Self {
        Self {
            store,
            cache_key: cache_key.into(),
            state: ArcSwap::from_pointee(Snapshot {
                generation: 0,
                rules: None,
            }),
            hits: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Create a cold cache with the default cache key.
    #[must_use]
    pub fn with_default_key(store: Arc<dyn RuleStore>) -> Self {
        Self::new(store, DEFAULT_CACHE_KEY)
    }

    /// Key the snapshot is cached under.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The store the cache loads from.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// Get every active rule, loading from the store when cold.
    ///
    /// Never fails: a store failure yields an empty set.
    pub fn get_active_rules(&self) -> Arc<[Rule]> {
        let observed = self.state.load_full();
        if let Some(rules) = &observed.rules {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(rules);
        }

        let Some(rules) = self.load() else {
            return Arc::from(Vec::new());
        };

        let next = Arc::new(Snapshot {
            generation: observed.generation,
            rules: Some(Arc::clone(&rules)),
        });
        let previous = self.state.compare_and_swap(&observed, next);

        if Arc::ptr_eq(&*previous, &observed) {
            tracing::info!(
                cache_key = %self.cache_key,
                rules = rules.len(),
                generation = observed.generation,
                "Rule cache loaded"
            );
        } else {
            tracing::debug!(
                cache_key = %self.cache_key,
                generation = observed.generation,
                "Rule cache changed during load, snapshot not installed"
            );
        }

        rules
    }

    /// Get the active rules for one entity type, in store order.
    pub fn get_rules_for(&self, entity_type: &str) -> Vec<Rule> {
        self.get_active_rules()
            .iter()
            .filter(|rule| rule.entity_type == entity_type)
            .cloned()
            .collect()
    }

    /// Drop the snapshot; the next access reloads from the store.
    pub fn invalidate(&self) {
        let previous = self.state.rcu(|current| Snapshot {
            generation: current.generation + 1,
            rules: None,
        });
        self.invalidations.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            cache_key = %self.cache_key,
            generation = previous.generation + 1,
            "Rule cache invalidated"
        );
    }

    /// Returns `true` if a snapshot is installed.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.state.load().rules.is_some()
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> RuleCacheStats {
        let state = self.state.load();
        RuleCacheStats {
            cache_key: self.cache_key.clone(),
            warm: state.rules.is_some(),
            rule_count: state.rules.as_ref().map_or(0, |rules| rules.len()),
            generation: state.generation,
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Query the store and classify the result.
    ///
    /// Returns `None` on store failure. Malformed rules are skipped.
    fn load(&self) -> Option<Arc<[Rule]>> {
        let records = match self.store.query_active_rules() {
            Ok(records) => records,
            Err(e) => {
                self.load_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    cache_key = %self.cache_key,
                    error = %e,
                    "Rule store unavailable, applying no field rules"
                );
                return None;
            }
        };
        self.loads.fetch_add(1, Ordering::Relaxed);

        let rules = records
            .iter()
            .filter(|record| record.is_active)
            .filter_map(|record| match record.to_rule() {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(
                        rule_id = record.id,
                        entity_type = %record.entity_type,
                        field = %record.field_name,
                        error = %e,
                        "Skipping malformed field rule"
                    );
                    None
                }
            })
            .collect();

        Some(rules)
    }
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCache")
            .field("cache_key", &self.cache_key)
            .field("warm", &self.is_warm())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Cache Statistics
// =============================================================================

/// Statistics about the rule cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCacheStats {
    /// Key the snapshot is cached under.
    pub cache_key: String,

    /// Whether a snapshot is installed.
    pub warm: bool,

    /// Number of rules in the installed snapshot.
    pub rule_count: usize,

    /// Current generation (number of invalidations applied).
    pub generation: u64,

    /// Reads served from the snapshot.
    pub hits: u64,

    /// Successful store queries.
    pub loads: u64,

    /// Failed store queries.
    pub load_failures: u64,

    /// Invalidations.
    pub invalidations: u64,
}

// =============================================================================
// Tests
// =============================================================================
