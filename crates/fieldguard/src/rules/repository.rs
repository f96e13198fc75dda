//! Validated rule management.
//!
//! Every mutation validates the definition, writes through the store,
//! invalidates the cache before returning and then notifies subscribers.

use std::sync::Arc;

use serde::Serialize;

use crate::FieldGuardResult;
use crate::error::FieldGuardError;
use crate::rules::cache::RuleCache;
use crate::rules::notify::{RuleChange, RuleChangeNotifier};
use crate::rules::rule::{NewRule, RuleChanges, RuleRecord};
use crate::rules::store::{RuleFilter, RuleStore};
use crate::rules::validation::RuleValidator;

/// Default page size for [`RuleRepository::list`].
pub const DEFAULT_PER_PAGE: usize = 15;

// =============================================================================
// Page
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,

    /// 1-based page number.
    pub page: usize,

    /// Page size.
    pub per_page: usize,

    /// Total matching items.
    pub total: usize,
}

impl<T> Page<T> {
    /// Slices `items` into the requested page.
    ///
    /// `page` is 1-based; `0` is treated as `1`. A `per_page` of `0` uses
    /// [`DEFAULT_PER_PAGE`].
    #[must_use]
    pub fn paginate(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = if per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            per_page
        };
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            items,
            page,
            per_page,
            total,
        }
    }

    /// Number of the last page (at least 1).
    #[must_use]
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Returns `true` if pages follow this one.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.page < self.last_page()
    }
}

// =============================================================================
// Rule Repository
// =============================================================================

/// Rule management with validation and cache invalidation.
pub struct RuleRepository {
    store: Arc<dyn RuleStore>,
    cache: Arc<RuleCache>,
    validator: RuleValidator,
    notifier: Arc<RuleChangeNotifier>,
}

impl RuleRepository {
    /// Create a repository.
    ///
    /// `cache` should load from the same store as `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleStore>,
        cache: Arc<RuleCache>,
        validator: RuleValidator,
        notifier: Arc<RuleChangeNotifier>,
    ) -> Self {
        Self {
            store,
            cache,
            validator,
            notifier,
        }
    }

    /// The change notifier.
    #[must_use]
    pub fn notifier(&self) -> &Arc<RuleChangeNotifier> {
        &self.notifier
    }

    /// Create a rule.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The definition fails validation
    /// - A rule for the same entity type and field already exists
    /// - The store fails
    pub fn create(&self, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        self.validator.validate(&rule)?;
        let record = self.store.insert(rule)?;
        self.changed(RuleChange::Created { rule_id: record.id });

        tracing::info!(
            rule_id = record.id,
            entity_type = %record.entity_type,
            field = %record.field_name,
            "Field rule created"
        );
        Ok(record)
    }

    /// Update a rule.
    ///
    /// The changes are merged over the current definition and the merged
    /// result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The rule doesn't exist
    /// - The merged definition fails validation
    /// - The store fails
    pub fn update(&self, id: u64, changes: RuleChanges) -> FieldGuardResult<RuleRecord> {
        let current = self
            .store
            .get(id)?
            .ok_or_else(|| FieldGuardError::rule_not_found(id))?;

        let merged = changes.apply_to(&current);
        self.validator.validate(&merged)?;
        let record = self.store.update(id, merged)?;
        self.changed(RuleChange::Updated { rule_id: id });

        tracing::info!(
            rule_id = id,
            entity_type = %record.entity_type,
            field = %record.field_name,
            "Field rule updated"
        );
        Ok(record)
    }

    /// Delete a rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule doesn't exist or the store fails.
    pub fn delete(&self, id: u64) -> FieldGuardResult<()> {
        self.store.delete(id)?;
        self.changed(RuleChange::Deleted { rule_id: id });

        tracing::info!(rule_id = id, "Field rule deleted");
        Ok(())
    }

    /// Get a rule by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get(&self, id: u64) -> FieldGuardResult<Option<RuleRecord>> {
        self.store.get(id)
    }

    /// List rules matching `filter`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list(
        &self,
        filter: &RuleFilter,
        page: usize,
        per_page: usize,
    ) -> FieldGuardResult<Page<RuleRecord>> {
        let rules = self.store.list(filter)?;
        Ok(Page::paginate(rules, page, per_page))
    }

    /// Drop the cached rule set and tell subscribers to do the same.
    pub fn clear_cache(&self) {
        self.changed(RuleChange::CacheCleared);
    }

    fn changed(&self, change: RuleChange) {
        self.cache.invalidate();
        self.notifier.notify(change);
    }
}

impl std::fmt::Debug for RuleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRepository")
            .field("cache", &self.cache)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
