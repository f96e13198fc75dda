//! # fieldguard-memory
//!
//! In-memory [`RuleStore`] backed by papaya lock-free hash maps.
//!
//! This store provides:
//! - Lock-free concurrent access via `papaya::HashMap`
//! - Lock-free reads; writes serialized so the rule map and the key index
//!   change together
//! - Uniqueness on `(entity_type, field_name)`
//! - Store order by ascending rule ID
//! - An availability switch and a query counter for exercising the
//!   engine's failure and caching behavior
//!
//! ```ignore
//! use fieldguard::{FieldGuard, NewRule};
//! use fieldguard_memory::InMemoryRuleStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryRuleStore::new());
//! store.insert(NewRule::new("User", "ssn").with_read_policy("role:admin"))?;
//! let guard = FieldGuard::builder().store(store).build()?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use fieldguard::{FieldGuardError, FieldGuardResult, NewRule, RuleFilter, RuleRecord, RuleStore};
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;

/// Uniqueness key: `(entity_type, field_name)`.
type RuleKey = (String, String);

fn key_of(rule: &NewRule) -> RuleKey {
    (rule.entity_type.clone(), rule.field_name.clone())
}

/// In-memory rule store.
#[derive(Debug)]
pub struct InMemoryRuleStore {
    /// Rules by ID.
    rules: PapayaHashMap<u64, RuleRecord>,
    /// Unique index: key -> rule ID.
    keys: PapayaHashMap<RuleKey, u64>,
    /// Next rule ID.
    next_id: AtomicU64,
    /// When `false`, every operation fails with a store error.
    available: AtomicBool,
    /// Number of `query_active_rules` calls.
    queries: AtomicUsize,
    /// Held across every write that touches both maps.
    writer: Mutex<()>,
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRuleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: PapayaHashMap::new(),
            keys: PapayaHashMap::new(),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
            queries: AtomicUsize::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Creates a store holding `rules`, in order.
    ///
    /// # Errors
    ///
    /// Returns `FieldGuardError::Conflict` if two rules share a key.
    pub fn with_rules(rules: impl IntoIterator<Item = NewRule>) -> FieldGuardResult<Self> {
        let store = Self::new();
        for rule in rules {
            store.insert(rule)?;
        }
        Ok(store)
    }

    /// Makes the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::debug!(available, "In-memory rule store availability changed");
    }

    /// Number of `query_active_rules` calls so far, failed ones included.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of stored rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rules are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn check_available(&self) -> FieldGuardResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FieldGuardError::store("in-memory rule store is unavailable"))
        }
    }

    fn write_lock(&self) -> FieldGuardResult<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| FieldGuardError::store("in-memory rule store writer lock poisoned"))
    }

    fn sorted(&self, filter: impl Fn(&RuleRecord) -> bool) -> Vec<RuleRecord> {
        let guard = self.rules.pin();
        let mut rules: Vec<_> = guard
            .values()
            .filter(|rule| filter(rule))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.id);
        rules
    }

    /// Claims `key` for `id`; succeeds if it is free or already held by `id`.
    fn claim(&self, key: RuleKey, id: u64) -> FieldGuardResult<()> {
        let keys = self.keys.pin();
        match keys.try_insert(key.clone(), id) {
            Ok(_) => Ok(()),
            Err(occupied) if *occupied.current == id => Ok(()),
            Err(_) => {
                let (entity_type, field_name) = key;
                Err(FieldGuardError::conflict(entity_type, field_name))
            }
        }
    }
}

impl RuleStore for InMemoryRuleStore {
    fn query_active_rules(&self) -> FieldGuardResult<Vec<RuleRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.sorted(|rule| rule.is_active))
    }

    fn get(&self, id: u64) -> FieldGuardResult<Option<RuleRecord>> {
        self.check_available()?;
        Ok(self.rules.pin().get(&id).cloned())
    }

    fn list(&self, filter: &RuleFilter) -> FieldGuardResult<Vec<RuleRecord>> {
        self.check_available()?;
        Ok(self.sorted(|rule| filter.matches(rule)))
    }

    fn insert(&self, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        self.check_available()?;
        let _writer = self.write_lock()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.claim(key_of(&rule), id)?;

        let record = RuleRecord::new(id, rule, OffsetDateTime::now_utc());
        self.rules.pin().insert(id, record.clone());

        tracing::debug!(
            rule_id = id,
            entity_type = %record.entity_type,
            field = %record.field_name,
            "Rule stored"
        );
        Ok(record)
    }

    fn update(&self, id: u64, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        self.check_available()?;
        let _writer = self.write_lock()?;

        let rules = self.rules.pin();
        let existing = rules
            .get(&id)
            .ok_or_else(|| FieldGuardError::rule_not_found(id))?;

        let old_key = (existing.entity_type.clone(), existing.field_name.clone());
        let new_key = key_of(&rule);
        let moved = new_key != old_key;
        if moved {
            self.claim(new_key, id)?;
        }

        let record = existing.replaced(rule, OffsetDateTime::now_utc());
        rules.insert(id, record.clone());

        if moved {
            self.keys.pin().remove(&old_key);
        }

        tracing::debug!(rule_id = id, "Rule replaced");
        Ok(record)
    }

    fn delete(&self, id: u64) -> FieldGuardResult<()> {
        self.check_available()?;
        let _writer = self.write_lock()?;

        let rules = self.rules.pin();
        let removed = rules
            .remove(&id)
            .ok_or_else(|| FieldGuardError::rule_not_found(id))?;
        self.keys
            .pin()
            .remove(&(removed.entity_type.clone(), removed.field_name.clone()));

        tracing::debug!(rule_id = id, "Rule removed");
        Ok(())
    }
}
