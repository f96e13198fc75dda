//! Rule store trait.
//!
//! Defines the interface for rule persistence. Implementations are provided by
//! storage backends (see the `fieldguard-memory` crate for an in-memory one).

use std::sync::Arc;

use crate::FieldGuardResult;
use crate::rules::rule::{NewRule, RuleRecord};

// =============================================================================
// Rule Filter
// =============================================================================

/// Filter for listing rules.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleFilter {
    /// Exact entity type.
    pub entity_type: Option<String>,

    /// Field-name substring.
    pub field_name: Option<String>,

    /// Active flag.
    pub active: Option<bool>,
}

impl RuleFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entity type filter.
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the field name filter (substring match).
    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Set the active filter.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Returns `true` if `rule` passes every set criterion.
    #[must_use]
    pub fn matches(&self, rule: &RuleRecord) -> bool {
        self.entity_type
            .as_ref()
            .is_none_or(|entity_type| rule.entity_type == *entity_type)
            && self
                .field_name
                .as_ref()
                .is_none_or(|needle| rule.field_name.contains(needle.as_str()))
            && self.active.is_none_or(|active| rule.is_active == active)
    }
}

// =============================================================================
// Rule Store Trait
// =============================================================================

/// Durable storage for field rules.
///
/// Implementations must enforce uniqueness on `(entity_type, field_name)`.
pub trait RuleStore: Send + Sync {
    /// List every active rule, in store order.
    ///
    /// # Errors
    ///
    /// Returns `FieldGuardError::Store` if the store is unreachable.
    fn query_active_rules(&self) -> FieldGuardResult<Vec<RuleRecord>>;

    /// Get a rule by its ID.
    ///
    /// Returns `None` if the rule doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, id: u64) -> FieldGuardResult<Option<RuleRecord>>;

    /// List rules matching `filter`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list(&self, filter: &RuleFilter) -> FieldGuardResult<Vec<RuleRecord>>;

    /// Insert a new rule and assign its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A rule for the same entity type and field already exists
    /// - The storage operation fails
    fn insert(&self, rule: NewRule) -> FieldGuardResult<RuleRecord>;

    /// Replace an existing rule's definition.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The rule doesn't exist
    /// - Another rule already covers the new entity type and field
    /// - The storage operation fails
    fn update(&self, id: u64, rule: NewRule) -> FieldGuardResult<RuleRecord>;

    /// Delete a rule.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The rule doesn't exist
    /// - The storage operation fails
    fn delete(&self, id: u64) -> FieldGuardResult<()>;
}

impl<S: RuleStore + ?Sized> RuleStore for Arc<S> {
    fn query_active_rules(&self) -> FieldGuardResult<Vec<RuleRecord>> {
        (**self).query_active_rules()
    }

    fn get(&self, id: u64) -> FieldGuardResult<Option<RuleRecord>> {
        (**self).get(id)
    }

    fn list(&self, filter: &RuleFilter) -> FieldGuardResult<Vec<RuleRecord>> {
        (**self).list(filter)
    }

    fn insert(&self, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        (**self).insert(rule)
    }

    fn update(&self, id: u64, rule: NewRule) -> FieldGuardResult<RuleRecord> {
        (**self).update(id, rule)
    }

    fn delete(&self, id: u64) -> FieldGuardResult<()> {
        (**self).delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn rule(entity_type: &str, field_name: &str, active: bool) -> RuleRecord {
        RuleRecord::new(
            1,
            NewRule::new(entity_type, field_name).with_active(active),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(RuleFilter::new().matches(&rule("User", "ssn", false)));
    }

    #[test]
    fn test_entity_type_is_exact() {
        let filter = RuleFilter::new().with_entity_type("User");
        assert!(filter.matches(&rule("User", "ssn", true)));
        assert!(!filter.matches(&rule("UserProfile", "ssn", true)));
    }

    #[test]
    fn test_field_name_is_substring() {
        let filter = RuleFilter::new().with_field_name("sal");
        assert!(filter.matches(&rule("Employee", "base_salary", true)));
        assert!(!filter.matches(&rule("Employee", "bonus", true)));
    }

    #[test]
    fn test_criteria_combine() {
        let filter = RuleFilter::new()
            .with_entity_type("Employee")
            .with_active(true);
        assert!(filter.matches(&rule("Employee", "salary", true)));
        assert!(!filter.matches(&rule("Employee", "salary", false)));
        assert!(!filter.matches(&rule("User", "salary", true)));
    }
}
