//! # fieldguard
//!
//! Field-level access control for structured records.
//!
//! This crate decides, per record field, whether an actor may read or write
//! that field's value, and applies masking, hiding or reverting when denied.
//!
//! ## Overview
//!
//! Rules are keyed by `(entity type, field)` and carry an optional read
//! policy, an optional write policy and an optional mask. The active rule set
//! is loaded lazily from a [`RuleStore`] into a [`RuleCache`] and dropped as a
//! whole whenever a rule changes. [`FieldGuard`] applies the rules of a
//! record's entity type through a [`PermissionEvaluator`].
//!
//! ## Modules
//!
//! - [`config`] - Engine configuration
//! - [`actor`] - The acting identity capability
//! - [`record`] - The record capability and a generic [`Model`]
//! - [`policy`] - Permission expressions and their evaluation
//! - [`rules`] - Rule types, storage trait, cache and management
//! - [`engine`] - The field security engine
//! - [`hook`] - Automatic enforcement on the record lifecycle
//! - [`input`] - Request input filtering

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod input;
pub mod policy;
pub mod record;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::{Actor, Principal};
pub use config::{ConfigError, DEFAULT_CACHE_KEY, FieldGuardConfig, ValidationMode};
pub use engine::{FieldGuard, FieldGuardBuilder, WriteTarget};
pub use error::{ErrorCategory, FieldGuardError};
pub use hook::{
    ActorSource, EnforcementHook, LifecycleListener, LifecyclePoint, LifecycleRegistry,
    RecordLifecycle,
};
pub use input::{InputFilter, is_safe_method};
pub use policy::{
    DenyAll, GateRegistry, NamedPolicy, PermissionEvaluator, PermissionExpression, PolicyFn,
    PolicyParseError, PolicyResolver, ResolverError, ResolverRegistry, StructuredPolicy,
};
pub use record::{Model, Record};
pub use rules::{
    EntityCatalog, EntityDescriptor, EntityLookup, EntityRegistry, FieldAction, NewRule, Page,
    Rule, RuleCache, RuleCacheStats, RuleChange, RuleChangeNotifier, RuleChanges, RuleFilter,
    RuleRecord, RuleRepository, RuleStore, RuleValidator, spawn_invalidation_listener,
};

/// Type alias for field security results.
pub type FieldGuardResult<T> = Result<T, FieldGuardError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use fieldguard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::FieldGuardResult;
    pub use crate::actor::{Actor, Principal};
    pub use crate::config::{FieldGuardConfig, ValidationMode};
    pub use crate::engine::{FieldGuard, WriteTarget};
    pub use crate::error::{ErrorCategory, FieldGuardError};
    pub use crate::hook::{ActorSource, LifecyclePoint, LifecycleRegistry, RecordLifecycle};
    pub use crate::input::InputFilter;
    pub use crate::policy::{GateRegistry, NamedPolicy, PermissionExpression, StructuredPolicy};
    pub use crate::record::{Model, Record};
    pub use crate::rules::{FieldAction, NewRule, Rule, RuleCache, RuleRepository, RuleStore};
}
