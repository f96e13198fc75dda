//! Field rules: representation, storage, caching and management.
//!
//! - [`rule`]: [`Rule`] (evaluation form) and [`RuleRecord`] (persisted form)
//! - [`store`]: the [`RuleStore`] trait implemented by storage backends
//! - [`cache`]: [`RuleCache`], the lazily loaded active rule set
//! - [`catalog`] and [`validation`]: entity metadata and rule checks
//! - [`repository`]: [`RuleRepository`], validated mutations with invalidation
//! - [`notify`]: change notification across cache instances

pub mod cache;
pub mod catalog;
pub mod notify;
pub mod repository;
pub mod rule;
pub mod store;
pub mod validation;

pub use cache::{RuleCache, RuleCacheStats};
pub use catalog::{EntityCatalog, EntityDescriptor, EntityLookup, EntityRegistry};
pub use notify::{
    RuleChange, RuleChangeNotifier, run_invalidation_listener, spawn_invalidation_listener,
};
pub use repository::{DEFAULT_PER_PAGE, Page, RuleRepository};
pub use rule::{FieldAction, NewRule, Rule, RuleChanges, RuleRecord};
pub use store::{RuleFilter, RuleStore};
pub use validation::{MAX_FIELD_NAME_LEN, MAX_MASK_LEN, RuleValidator};
