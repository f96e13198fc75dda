//! Shared test doubles.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use crate::FieldGuardResult;
use crate::error::FieldGuardError;
use crate::rules::{NewRule, RuleFilter, RuleRecord, RuleStore};

type QueryHook = Arc<dyn Fn() + Send + Sync>;

/// Vec-backed rule store with a query counter and failure switch.
pub(crate) struct MockRuleStore {
    rules: Mutex<Vec<RuleRecord>>,
    next_id: AtomicU64,
    available: AtomicBool,
    query_count: AtomicUsize,
    before_query: Mutex<Option<QueryHook>>,
}

impl MockRuleStore {
    pub(crate) fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
            query_count: AtomicUsize::new(0),
            before_query: Mutex::new(None),
        }
    }

    pub(crate) fn with_rules(rules: Vec<NewRule>) -> Self {
        let store = Self::new();
        for rule in rules {
            store.push(rule);
        }
        store
    }

    /// Adds a rule without any checks.
    pub(crate) fn push(&self, rule: NewRule) -> RuleRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RuleRecord::new(id, rule, OffsetDateTime::now_utc());
        self.rules.lock().unwrap().push(record.clone());
        record
    }

    pub(crate) fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Runs `hook` inside every `query_active_rules` call, before it returns.
    pub(crate) fn before_query(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.before_query.lock().unwrap() = Some(Arc::new(hook));
    }

    pub(crate) fn clear_before_query(&self) {
        *self.before_query.lock().unwrap() = None;
    }

    fn check_available(&self) -> FieldGuardResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FieldGuardError::store("connection refused"))
        }
    }

    fn check_unique(rules: &[RuleRecord], rule: &NewRule, except: Option<u64>) -> FieldGuardResult<()> {
        let taken = rules.iter().any(|existing| {
            Some(existing.id) != except
                && existing.entity_type == rule.entity_type
                && existing.field_name == rule.field_name
        });
        if taken {
            Err(FieldGuardError::conflict(&rule.entity_type, &rule.field_name))
        } else {
            Ok(())
        }
    }
}

impl RuleStore for MockRuleStore {
    fn query_active_rules(&self) -> FieldGuardResult<Vec<RuleRecord>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let rules: Vec<_> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect();

        let hook = self.before_query.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }

        Ok(rules)
    }

    fn get(&self, id: u64) -> FieldGuardResult<Option<RuleRecord>> {
        self.check_available()?;
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| rule.id == id)
            .cloned())
    }

    fn list(&self, filter: &RuleFilter) -> FieldGuardResult<Vec<RuleRecord>> {
        self.check_available()?;
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|rule| filter.matches(rule))
            .cloned()
            .collect())
    }

    fn insert(&self, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        self.check_available()?;
        Self::check_unique(&self.rules.lock().unwrap(), &rule, None)?;
        Ok(self.push(rule))
    }

    fn update(&self, id: u64, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        self.check_available()?;
        let mut rules = self.rules.lock().unwrap();
        Self::check_unique(&rules, &rule, Some(id))?;

        let existing = rules
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or_else(|| FieldGuardError::rule_not_found(id))?;
        *existing = existing.replaced(rule, OffsetDateTime::now_utc());
        Ok(existing.clone())
    }

    fn delete(&self, id: u64) -> FieldGuardResult<()> {
        self.check_available()?;
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|rule| rule.id != id);
        if rules.len() == before {
            return Err(FieldGuardError::rule_not_found(id));
        }
        Ok(())
    }
}
