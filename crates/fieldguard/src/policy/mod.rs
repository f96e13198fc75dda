//! Permission expressions and their evaluation.
//!
//! - [`expression`]: the [`PermissionExpression`] tagged union and its parser
//! - [`evaluator`]: [`PermissionEvaluator`] and the host capabilities it uses
//! - [`gate`]: [`GateRegistry`], a closure-backed [`NamedPolicy`]
//! - [`resolver`]: [`ResolverRegistry`] for custom structured-policy strategies

pub mod evaluator;
pub mod expression;
pub mod gate;
pub mod resolver;

pub use evaluator::{DenyAll, NamedPolicy, PermissionEvaluator, PolicyResolver};
pub use expression::{PermissionExpression, PolicyFn, PolicyParseError, StructuredPolicy};
pub use gate::GateRegistry;
pub use resolver::{ResolverError, ResolverFactory, ResolverRegistry};
