//! Permission evaluation.
//!
//! [`PermissionEvaluator`] resolves one [`PermissionExpression`] against an
//! optional actor and a record. It never fails: every branch answers with a
//! plain `bool`, and capabilities the actor lacks count as denial.

use std::sync::Arc;

use crate::FieldGuardResult;
use crate::actor::Actor;
use crate::error::FieldGuardError;
use crate::policy::expression::{PermissionExpression, StructuredPolicy};
use crate::record::Record;

/// Host authorization capability for named checks and structured gates.
pub trait NamedPolicy: Send + Sync {
    /// Whether `actor` passes the named check `name` for `record`.
    fn allows(&self, name: &str, actor: Option<&dyn Actor>, record: &dyn Record) -> bool;

    /// Like [`allows`](Self::allows), but returns an error on denial.
    ///
    /// # Errors
    ///
    /// Returns `FieldGuardError::Unauthorized` naming the denied check.
    fn authorize(
        &self,
        name: &str,
        actor: Option<&dyn Actor>,
        record: &dyn Record,
    ) -> FieldGuardResult<()> {
        if self.allows(name, actor, record) {
            Ok(())
        } else {
            Err(FieldGuardError::unauthorized(name))
        }
    }
}

/// Named policy that denies every check.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl NamedPolicy for DenyAll {
    fn allows(&self, _name: &str, _actor: Option<&dyn Actor>, _record: &dyn Record) -> bool {
        false
    }
}

/// Custom strategy for structured policies.
///
/// When one is configured it replaces the built-in structured semantics
/// entirely.
pub trait PolicyResolver: Send + Sync {
    /// Decides a structured policy.
    fn resolve(
        &self,
        policy: &StructuredPolicy,
        record: &dyn Record,
        actor: Option<&dyn Actor>,
    ) -> bool;
}

/// Resolves permission expressions to access decisions.
#[derive(Clone)]
pub struct PermissionEvaluator {
    named: Arc<dyn NamedPolicy>,
    resolver: Option<Arc<dyn PolicyResolver>>,
}

impl PermissionEvaluator {
    /// Creates an evaluator with default structured-policy semantics.
    #[must_use]
    pub fn new(named: Arc<dyn NamedPolicy>) -> Self {
        Self {
            named,
            resolver: None,
        }
    }

    /// Delegates structured policies to `resolver`.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PolicyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Returns `true` if a custom resolver is configured.
    #[must_use]
    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// The named policy capability in use.
    #[must_use]
    pub fn named_policy(&self) -> &Arc<dyn NamedPolicy> {
        &self.named
    }

    /// Decides whether `actor` satisfies `expression` for `record`.
    pub fn evaluate(
        &self,
        expression: &PermissionExpression,
        actor: Option<&dyn Actor>,
        record: &dyn Record,
    ) -> bool {
        match expression {
            PermissionExpression::Callable(check) => check(actor, record),
            PermissionExpression::Always(allowed) => *allowed,
            PermissionExpression::RoleCheck(role) => holds_role(actor, role),
            PermissionExpression::SelfCheck => is_self(actor, record),
            PermissionExpression::Structured(policy) => {
                self.evaluate_structured(policy, actor, record)
            }
            PermissionExpression::NamedCheck(name) => self.named.allows(name, actor, record),
        }
    }

    fn evaluate_structured(
        &self,
        policy: &StructuredPolicy,
        actor: Option<&dyn Actor>,
        record: &dyn Record,
    ) -> bool {
        if let Some(resolver) = &self.resolver {
            return resolver.resolve(policy, record, actor);
        }

        let mut allowed = true;

        if let Some(roles) = &policy.roles {
            allowed &= roles.iter().any(|role| holds_role(actor, role));
        }

        if policy.allow_self == Some(true) {
            let own = is_self(actor, record);
            if policy.roles.is_some() {
                allowed |= own;
            } else {
                allowed &= own;
            }
        }

        if let Some(gate) = &policy.gate {
            allowed &= self.named.allows(gate, actor, record);
        }

        allowed
    }
}

impl std::fmt::Debug for PermissionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEvaluator")
            .field("has_resolver", &self.has_resolver())
            .finish_non_exhaustive()
    }
}

fn holds_role(actor: Option<&dyn Actor>, role: &str) -> bool {
    actor.and_then(|a| a.has_role(role)).unwrap_or(false)
}

fn is_self(actor: Option<&dyn Actor>, record: &dyn Record) -> bool {
    match (actor, record.key_value()) {
        (Some(actor), Some(key)) => actor.id() == *key,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Principal;
    use crate::policy::gate::GateRegistry;
    use crate::record::Model;
    use serde_json::json;

    fn employee(id: i64) -> Model {
        Model::retrieved(
            "Employee",
            serde_json::from_value(json!({"id": id, "salary": 100})).unwrap(),
        )
    }

    fn evaluator() -> PermissionEvaluator {
        let gates = GateRegistry::new()
            .define("view-salary", |actor, _| {
                actor.and_then(|a| a.has_role("payroll")).unwrap_or(false)
            })
            .define("open", |_, _| true);
        PermissionEvaluator::new(Arc::new(gates))
    }

    fn structured(value: serde_json::Value) -> PermissionExpression {
        PermissionExpression::from_json(&value).unwrap().unwrap()
    }

    // ---------------------------------------------------------------------
    // Simple expressions
    // ---------------------------------------------------------------------

    #[test]
    fn test_always() {
        let ev = evaluator();
        let record = employee(1);
        assert!(ev.evaluate(&PermissionExpression::Always(true), None, &record));
        assert!(!ev.evaluate(&PermissionExpression::Always(false), None, &record));
    }

    #[test]
    fn test_role_check_requires_actor_and_capability() {
        let ev = evaluator();
        let record = employee(1);
        let expr = PermissionExpression::RoleCheck("admin".to_string());

        assert!(!ev.evaluate(&expr, None, &record));
        assert!(!ev.evaluate(&expr, Some(&Principal::new(1)), &record));
        assert!(!ev.evaluate(
            &expr,
            Some(&Principal::new(1).with_roles(["user"])),
            &record
        ));
        assert!(ev.evaluate(
            &expr,
            Some(&Principal::new(1).with_roles(["admin"])),
            &record
        ));
    }

    #[test]
    fn test_self_check_uses_strict_equality() {
        let ev = evaluator();
        let record = employee(5);

        assert!(ev.evaluate(&PermissionExpression::SelfCheck, Some(&Principal::new(5)), &record));
        assert!(!ev.evaluate(&PermissionExpression::SelfCheck, Some(&Principal::new(6)), &record));
        assert!(!ev.evaluate(&PermissionExpression::SelfCheck, Some(&Principal::new("5")), &record));
        assert!(!ev.evaluate(&PermissionExpression::SelfCheck, None, &record));
    }

    #[test]
    fn test_self_check_without_key_value_denies() {
        let ev = evaluator();
        let record = Model::new("Employee");
        assert!(!ev.evaluate(
            &PermissionExpression::SelfCheck,
            Some(&Principal::new(serde_json::Value::Null)),
            &record
        ));
    }

    #[test]
    fn test_named_check_delegates() {
        let ev = evaluator();
        let record = employee(1);
        let payroll = Principal::new(2).with_roles(["payroll"]);

        let expr = PermissionExpression::NamedCheck("view-salary".to_string());
        assert!(ev.evaluate(&expr, Some(&payroll), &record));
        assert!(!ev.evaluate(&expr, Some(&Principal::new(2)), &record));

        let undefined = PermissionExpression::NamedCheck("missing".to_string());
        assert!(!ev.evaluate(&undefined, Some(&payroll), &record));
    }

    #[test]
    fn test_callable_receives_actor_and_record() {
        let ev = evaluator();
        let record = employee(9);
        let expr = PermissionExpression::callable(|actor, record| {
            actor.is_some() && record.key_value() == Some(&json!(9))
        });
        assert!(ev.evaluate(&expr, Some(&Principal::new(1)), &record));
        assert!(!ev.evaluate(&expr, None, &record));
    }

    // ---------------------------------------------------------------------
    // Structured policies
    // ---------------------------------------------------------------------

    #[test]
    fn test_structured_roles_or_self() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"roles": ["admin"], "allow_self": true}));

        assert!(ev.evaluate(&expr, Some(&Principal::new(5).with_roles(["user"])), &record));
        assert!(ev.evaluate(&expr, Some(&Principal::new(6).with_roles(["admin"])), &record));
        assert!(!ev.evaluate(&expr, Some(&Principal::new(6).with_roles(["user"])), &record));
    }

    #[test]
    fn test_structured_roles_without_self_ignores_ownership() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"roles": ["admin"]}));

        assert!(!ev.evaluate(&expr, Some(&Principal::new(5).with_roles(["user"])), &record));
        assert!(ev.evaluate(&expr, Some(&Principal::new(5).with_roles(["admin"])), &record));
    }

    #[test]
    fn test_structured_self_without_roles_is_conjunctive() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"allow_self": true}));

        assert!(ev.evaluate(&expr, Some(&Principal::new(5)), &record));
        assert!(!ev.evaluate(&expr, Some(&Principal::new(6).with_roles(["admin"])), &record));
    }

    #[test]
    fn test_structured_gate_is_conjunctive() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"roles": ["admin"], "gate": "view-salary"}));

        assert!(!ev.evaluate(&expr, Some(&Principal::new(6).with_roles(["admin"])), &record));
        assert!(ev.evaluate(
            &expr,
            Some(&Principal::new(6).with_roles(["admin", "payroll"])),
            &record
        ));
    }

    #[test]
    fn test_structured_allow_self_false_is_ignored() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"allow_self": false, "gate": "open"}));
        assert!(ev.evaluate(&expr, None, &record));
    }

    #[test]
    fn test_structured_extra_keys_only_is_permissive() {
        let ev = evaluator();
        let record = employee(5);
        let expr = structured(json!({"tenant": "acme"}));
        assert!(ev.evaluate(&expr, None, &record));
    }

    struct TenantResolver;

    impl PolicyResolver for TenantResolver {
        fn resolve(
            &self,
            policy: &StructuredPolicy,
            record: &dyn Record,
            _actor: Option<&dyn Actor>,
        ) -> bool {
            policy.extra.get("tenant") == record.attribute("tenant")
        }
    }

    #[test]
    fn test_custom_resolver_replaces_structured_semantics() {
        let ev = evaluator().with_resolver(Arc::new(TenantResolver));
        assert!(ev.has_resolver());

        let mut record = employee(5);
        record.set_attribute("tenant", json!("acme"));

        let expr = structured(json!({"roles": ["admin"], "tenant": "acme"}));
        assert!(ev.evaluate(&expr, None, &record));

        let other = structured(json!({"tenant": "globex"}));
        assert!(!ev.evaluate(&other, None, &record));

        // Non-structured expressions keep built-in semantics.
        assert!(!ev.evaluate(&PermissionExpression::Always(false), None, &record));
    }

    // ---------------------------------------------------------------------
    // NamedPolicy::authorize
    // ---------------------------------------------------------------------

    #[test]
    fn test_authorize_maps_denial_to_error() {
        let record = employee(1);
        let err = DenyAll.authorize("manage-field-guard", None, &record).unwrap_err();
        assert!(matches!(err, FieldGuardError::Unauthorized { ability } if ability == "manage-field-guard"));

        let gates = GateRegistry::new().define("open", |_, _| true);
        assert!(gates.authorize("open", None, &record).is_ok());
    }
}
