//! Field security engine.
//!
//! [`FieldGuard`] applies the active rules of a record's entity type to one
//! record or a collection:
//!
//! - read denied: substitute the mask, or hide the field when there is none
//! - write denied: revert a dirty field to its last-persisted value, or drop
//!   the key from incoming input
//!
//! A field without a rule is always allowed, and so is an action whose policy
//! is absent. Rules come from the [`RuleCache`]; when the store is unreachable
//! the rule set is empty and every field is allowed.
//!
//! # Example
//!
//! ```ignore
//! use fieldguard::{FieldGuard, GateRegistry, Principal};
//! use std::sync::Arc;
//!
//! let guard = FieldGuard::builder()
//!     .store(store)
//!     .named_policy(Arc::new(GateRegistry::new()))
//!     .build()?;
//!
//! let actor = Principal::new(7).with_roles(["hr"]);
//! let visible = guard.secure_for_output(&employee, Some(&actor));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};

use crate::FieldGuardResult;
use crate::actor::Actor;
use crate::config::FieldGuardConfig;
use crate::error::FieldGuardError;
use crate::hook::{ActorSource, EnforcementHook, RecordLifecycle};
use crate::policy::{DenyAll, NamedPolicy, PermissionEvaluator, PermissionExpression, ResolverRegistry};
use crate::record::{Model, Record};
use crate::rules::{FieldAction, Rule, RuleCache, RuleStore};

// =============================================================================
// Write Target
// =============================================================================

/// What incoming write input is checked against.
#[derive(Clone, Copy)]
pub enum WriteTarget<'a> {
    /// An entity type; policies see a blank record of that type.
    Type(&'a str),
    /// A concrete record.
    Record(&'a dyn Record),
}

impl WriteTarget<'_> {
    /// Entity type the rules are looked up by.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        match self {
            Self::Type(entity_type) => *entity_type,
            Self::Record(record) => record.entity_type(),
        }
    }
}

impl<'a> From<&'a str> for WriteTarget<'a> {
    fn from(entity_type: &'a str) -> Self {
        Self::Type(entity_type)
    }
}

impl<'a> From<&'a String> for WriteTarget<'a> {
    fn from(entity_type: &'a String) -> Self {
        Self::Type(entity_type)
    }
}

impl<'a> From<&'a dyn Record> for WriteTarget<'a> {
    fn from(record: &'a dyn Record) -> Self {
        Self::Record(record)
    }
}

impl<'a> From<&'a Model> for WriteTarget<'a> {
    fn from(record: &'a Model) -> Self {
        Self::Record(record)
    }
}

impl std::fmt::Debug for WriteTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type(entity_type) => f.debug_tuple("Type").field(entity_type).finish(),
            Self::Record(record) => f.debug_tuple("Record").field(&record.entity_type()).finish(),
        }
    }
}

// =============================================================================
// Field Guard
// =============================================================================

/// The field security engine.
pub struct FieldGuard {
    /// Engine configuration.
    config: FieldGuardConfig,

    /// Active rule snapshot.
    cache: Arc<RuleCache>,

    /// Permission evaluator.
    evaluator: PermissionEvaluator,

    /// Rules registered in code; a stored rule for the same field wins.
    code_rules: Vec<Rule>,

    /// Set once lifecycle enforcement is installed.
    enforcing: AtomicBool,
}

impl FieldGuard {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> FieldGuardBuilder {
        FieldGuardBuilder::default()
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &FieldGuardConfig {
        &self.config
    }

    /// The rule cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    /// The permission evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    /// Active rules for `entity_type`: stored rules in store order, then
    /// code rules for fields no stored rule covers.
    pub fn rules_for(&self, entity_type: &str) -> Vec<Rule> {
        let mut rules = self.cache.get_rules_for(entity_type);
        for rule in self
            .code_rules
            .iter()
            .filter(|rule| rule.active && rule.entity_type == entity_type)
        {
            if !rules.iter().any(|r| r.field_name == rule.field_name) {
                rules.push(rule.clone());
            }
        }
        rules
    }

    fn allows(
        &self,
        policy: Option<&PermissionExpression>,
        actor: Option<&dyn Actor>,
        record: &dyn Record,
    ) -> bool {
        policy.is_none_or(|policy| self.evaluator.evaluate(policy, actor, record))
    }

    /// Mask or hide every field whose read policy denies `actor`.
    ///
    /// Applying it twice leaves the record as applying it once does.
    pub fn apply_read_security(&self, record: &mut dyn Record, actor: Option<&dyn Actor>) {
        for rule in self.rules_for(record.entity_type()) {
            if self.allows(rule.read_policy.as_ref(), actor, &*record) {
                continue;
            }

            match &rule.mask {
                Some(mask) => record.set_attribute(&rule.field_name, Value::String(mask.clone())),
                None => record.hide(&rule.field_name),
            }

            tracing::debug!(
                entity_type = %rule.entity_type,
                field = %rule.field_name,
                masked = rule.mask.is_some(),
                "Field read denied"
            );
        }
    }

    /// Revert every dirty field whose write policy denies `actor`.
    ///
    /// A denied field returns to its last-persisted value, or is unset when
    /// it was never persisted. Clean fields are never touched.
    pub fn apply_write_security(&self, record: &mut dyn Record, actor: Option<&dyn Actor>) {
        for rule in self.rules_for(record.entity_type()) {
            if rule.write_policy.is_none() || !record.is_dirty(&rule.field_name) {
                continue;
            }
            if self.allows(rule.write_policy.as_ref(), actor, &*record) {
                continue;
            }

            match record.original(&rule.field_name).cloned() {
                Some(original) => record.set_attribute(&rule.field_name, original),
                None => record.unset_attribute(&rule.field_name),
            }

            tracing::debug!(
                entity_type = %rule.entity_type,
                field = %rule.field_name,
                "Field write denied, change reverted"
            );
        }
    }

    /// Projection of `record` with `action` security applied.
    ///
    /// For reads, denied fields carry their mask (inserted even when absent
    /// from the projection) or are omitted. For writes, denied fields are
    /// omitted. The record itself is not modified.
    pub fn secure_model(
        &self,
        record: &dyn Record,
        actor: Option<&dyn Actor>,
        action: FieldAction,
    ) -> Map<String, Value> {
        let mut attributes = record.to_projection();

        for rule in self.rules_for(record.entity_type()) {
            if self.allows(rule.policy_for(action), actor, record) {
                continue;
            }

            match (action, rule.mask) {
                (FieldAction::Read, Some(mask)) => {
                    attributes.insert(rule.field_name, Value::String(mask));
                }
                _ => {
                    attributes.shift_remove(&rule.field_name);
                }
            }
        }

        attributes
    }

    /// Read-secured projection of `record`.
    pub fn secure_for_output(
        &self,
        record: &dyn Record,
        actor: Option<&dyn Actor>,
    ) -> Map<String, Value> {
        self.secure_model(record, actor, FieldAction::Read)
    }

    /// Read-secured projections of `records`, in order.
    pub fn secure_collection<R: Record>(
        &self,
        records: &[R],
        actor: Option<&dyn Actor>,
    ) -> Vec<Map<String, Value>> {
        records
            .iter()
            .map(|record| self.secure_for_output(record, actor))
            .collect()
    }

    /// Drop input keys whose write policy denies `actor`.
    ///
    /// Keys without a rule pass through. With no rules for the entity type,
    /// `input` is returned unchanged.
    pub fn filter_write_attributes<'a>(
        &self,
        target: impl Into<WriteTarget<'a>>,
        mut input: Map<String, Value>,
        actor: Option<&dyn Actor>,
    ) -> Map<String, Value> {
        let target = target.into();
        let rules = self.rules_for(target.entity_type());
        if rules.is_empty() {
            return input;
        }

        let blank;
        let record: &dyn Record = match target {
            WriteTarget::Record(record) => record,
            WriteTarget::Type(entity_type) => {
                blank = Model::new(entity_type);
                &blank
            }
        };

        for rule in &rules {
            if !input.contains_key(&rule.field_name) {
                continue;
            }
            if !self.allows(rule.write_policy.as_ref(), actor, record) {
                input.shift_remove(&rule.field_name);
                tracing::debug!(
                    entity_type = %rule.entity_type,
                    field = %rule.field_name,
                    "Write input field removed"
                );
            }
        }

        input
    }

    /// Drop the cached rule set.
    pub fn clear_cache(&self) {
        self.cache.invalidate();
        tracing::info!(cache_key = %self.cache.cache_key(), "Field rule cache cleared");
    }

    /// Register read and write security on `lifecycle` for all entity types.
    ///
    /// Returns `false` without registering anything if enforcement is
    /// already installed for this engine.
    pub fn enable_automatic_enforcement(
        self: &Arc<Self>,
        lifecycle: &dyn RecordLifecycle,
        actors: Arc<dyn ActorSource>,
    ) -> bool {
        if self.enforcing.swap(true, Ordering::SeqCst) {
            tracing::debug!("Automatic field enforcement already enabled");
            return false;
        }

        EnforcementHook::install(Arc::clone(self), lifecycle, actors);
        tracing::info!("Automatic field enforcement enabled");
        true
    }

    /// Enables automatic enforcement if the configuration asks for it.
    ///
    /// Returns `true` if enforcement was installed by this call.
    pub fn boot(
        self: &Arc<Self>,
        lifecycle: &dyn RecordLifecycle,
        actors: Arc<dyn ActorSource>,
    ) -> bool {
        self.config.automatic_enforcement && self.enable_automatic_enforcement(lifecycle, actors)
    }

    /// Returns `true` once lifecycle enforcement is installed.
    #[must_use]
    pub fn is_enforcing(&self) -> bool {
        self.enforcing.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FieldGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldGuard")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("evaluator", &self.evaluator)
            .field("code_rules", &self.code_rules.len())
            .field("enforcing", &self.is_enforcing())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`FieldGuard`].
#[derive(Default)]
pub struct FieldGuardBuilder {
    config: FieldGuardConfig,
    store: Option<Arc<dyn RuleStore>>,
    cache: Option<Arc<RuleCache>>,
    named: Option<Arc<dyn NamedPolicy>>,
    resolvers: ResolverRegistry,
    rules: Vec<Rule>,
}

impl FieldGuardBuilder {
    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: FieldGuardConfig) -> Self {
        self.config = config;
        self
    }

    /// Load rules from `store` through a new cache.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RuleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing cache. Takes precedence over [`store`](Self::store).
    #[must_use]
    pub fn cache(mut self, cache: Arc<RuleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the named policy capability. Defaults to denying every check.
    #[must_use]
    pub fn named_policy(mut self, named: Arc<dyn NamedPolicy>) -> Self {
        self.named = Some(named);
        self
    }

    /// Set the resolvers `custom_resolver` is looked up in.
    #[must_use]
    pub fn resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Register a rule in code.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns `FieldGuardError::Configuration` if:
    /// - The configuration fails validation
    /// - Neither a store nor a cache was provided
    pub fn build(self) -> FieldGuardResult<FieldGuard> {
        self.config
            .validate()
            .map_err(|e| FieldGuardError::configuration(e.to_string()))?;

        let cache = match (self.cache, self.store) {
            (Some(cache), _) => cache,
            (None, Some(store)) => Arc::new(RuleCache::new(store, self.config.cache_key.clone())),
            (None, None) => {
                return Err(FieldGuardError::configuration(
                    "a rule store or rule cache is required",
                ));
            }
        };

        let named = self
            .named
            .unwrap_or_else(|| Arc::new(DenyAll) as Arc<dyn NamedPolicy>);
        let mut evaluator = PermissionEvaluator::new(named);
        if let Some(resolver) = self
            .resolvers
            .select(self.config.custom_resolver.as_deref())
        {
            evaluator = evaluator.with_resolver(resolver);
        }

        Ok(FieldGuard {
            config: self.config,
            cache,
            evaluator,
            code_rules: self.rules,
            enforcing: AtomicBool::new(false),
        })
    }
}
