//! Permission expressions.
//!
//! A permission expression decides whether an actor may read or write one
//! field of one record. Persisted rules carry expressions as JSON; they are
//! classified once, when the rule set is loaded, into a
//! [`PermissionExpression`].
//!
//! # Shorthand grammar
//!
//! | String            | Expression                      |
//! |-------------------|---------------------------------|
//! | `"true"`/`"false"`| [`PermissionExpression::Always`] |
//! | `"role:<name>"`   | [`PermissionExpression::RoleCheck`] |
//! | `"self"`          | [`PermissionExpression::SelfCheck`] |
//! | anything else     | [`PermissionExpression::NamedCheck`] |
//!
//! JSON objects become a [`StructuredPolicy`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actor::Actor;
use crate::record::Record;

/// In-process permission check.
pub type PolicyFn = dyn Fn(Option<&dyn Actor>, &dyn Record) -> bool + Send + Sync;

/// A resolved permission expression.
#[derive(Clone)]
pub enum PermissionExpression {
    /// Constant decision.
    Always(bool),
    /// Actor must hold the role.
    RoleCheck(String),
    /// Actor id must equal the record's primary-key value.
    SelfCheck,
    /// Delegated to the named policy capability.
    NamedCheck(String),
    /// Host function; only constructed in-process, never persisted.
    Callable(Arc<PolicyFn>),
    /// Combination of role, self and gate clauses.
    Structured(StructuredPolicy),
}

impl PermissionExpression {
    /// Wraps a host function as an expression.
    pub fn callable<F>(check: F) -> Self
    where
        F: Fn(Option<&dyn Actor>, &dyn Record) -> bool + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(check))
    }

    /// Classifies a shorthand string.
    ///
    /// Returns `None` for the empty string, which imposes no restriction.
    #[must_use]
    pub fn parse_shorthand(source: &str) -> Option<Self> {
        let expression = match source {
            "" => return None,
            "true" => Self::Always(true),
            "false" => Self::Always(false),
            "self" => Self::SelfCheck,
            other => match other.strip_prefix("role:") {
                Some(role) => Self::RoleCheck(role.to_string()),
                None => Self::NamedCheck(other.to_string()),
            },
        };
        Some(expression)
    }

    /// Classifies a persisted JSON policy.
    ///
    /// `null`, `""` and `{}` impose no restriction and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error for numbers, arrays, and objects whose known keys
    /// have the wrong type.
    pub fn from_json(value: &Value) -> Result<Option<Self>, PolicyParseError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(allowed) => Ok(Some(Self::Always(*allowed))),
            Value::String(source) => Ok(Self::parse_shorthand(source)),
            Value::Object(map) if map.is_empty() => Ok(None),
            Value::Object(_) => {
                let policy = StructuredPolicy::deserialize(value)
                    .map_err(|e| PolicyParseError::InvalidStructure(e.to_string()))?;
                Ok(Some(Self::Structured(policy)))
            }
            Value::Number(_) => Err(PolicyParseError::UnsupportedShape("number")),
            Value::Array(_) => Err(PolicyParseError::UnsupportedShape("array")),
        }
    }

    /// Returns `true` for expressions that can be persisted.
    #[must_use]
    pub fn is_serializable(&self) -> bool {
        !matches!(self, Self::Callable(_))
    }
}

impl From<&str> for PermissionExpression {
    /// Classifies a shorthand string.
    ///
    /// The empty string imposes no restriction, as it does in a stored rule,
    /// and becomes `Always(true)`.
    fn from(source: &str) -> Self {
        Self::parse_shorthand(source).unwrap_or(Self::Always(true))
    }
}

impl From<bool> for PermissionExpression {
    fn from(allowed: bool) -> Self {
        Self::Always(allowed)
    }
}

impl From<StructuredPolicy> for PermissionExpression {
    fn from(policy: StructuredPolicy) -> Self {
        Self::Structured(policy)
    }
}

impl fmt::Debug for PermissionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always(allowed) => f.debug_tuple("Always").field(allowed).finish(),
            Self::RoleCheck(role) => f.debug_tuple("RoleCheck").field(role).finish(),
            Self::SelfCheck => write!(f, "SelfCheck"),
            Self::NamedCheck(name) => f.debug_tuple("NamedCheck").field(name).finish(),
            Self::Callable(_) => write!(f, "Callable(..)"),
            Self::Structured(policy) => f.debug_tuple("Structured").field(policy).finish(),
        }
    }
}

impl PartialEq for PermissionExpression {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Always(a), Self::Always(b)) => a == b,
            (Self::RoleCheck(a), Self::RoleCheck(b)) => a == b,
            (Self::SelfCheck, Self::SelfCheck) => true,
            (Self::NamedCheck(a), Self::NamedCheck(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => Arc::ptr_eq(a, b),
            (Self::Structured(a), Self::Structured(b)) => a == b,
            _ => false,
        }
    }
}

/// Structured policy as stored in the rule table.
///
/// Keys other than `roles`, `allow_self` and `gate` are kept in `extra` so a
/// custom resolver can interpret them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredPolicy {
    /// Actor must hold any of these roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Let the record's own subject through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_self: Option<bool>,

    /// Named policy that must also allow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,

    /// Resolver-specific keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructuredPolicy {
    /// Requires any of `roles`.
    #[must_use]
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: Some(roles.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Sets the self clause.
    #[must_use]
    pub fn allow_self(mut self, allow: bool) -> Self {
        self.allow_self = Some(allow);
        self
    }

    /// Sets the gate clause.
    #[must_use]
    pub fn gate(mut self, gate: impl Into<String>) -> Self {
        self.gate = Some(gate.into());
        self
    }
}

/// Errors raised while classifying a persisted policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyParseError {
    /// The JSON value has a shape no expression maps to.
    #[error("Unsupported policy shape: {0}")]
    UnsupportedShape(&'static str),

    /// A structured policy has a malformed clause.
    #[error("Invalid structured policy: {0}")]
    InvalidStructure(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shorthand_grammar() {
        assert_eq!(
            PermissionExpression::parse_shorthand("true"),
            Some(PermissionExpression::Always(true))
        );
        assert_eq!(
            PermissionExpression::parse_shorthand("false"),
            Some(PermissionExpression::Always(false))
        );
        assert_eq!(
            PermissionExpression::parse_shorthand("role:admin"),
            Some(PermissionExpression::RoleCheck("admin".to_string()))
        );
        assert_eq!(
            PermissionExpression::parse_shorthand("self"),
            Some(PermissionExpression::SelfCheck)
        );
        assert_eq!(
            PermissionExpression::parse_shorthand("view-salary"),
            Some(PermissionExpression::NamedCheck("view-salary".to_string()))
        );
        assert_eq!(PermissionExpression::parse_shorthand(""), None);
    }

    #[test]
    fn test_shorthand_is_case_sensitive() {
        assert_eq!(
            PermissionExpression::parse_shorthand("TRUE"),
            Some(PermissionExpression::NamedCheck("TRUE".to_string()))
        );
    }

    #[test]
    fn test_from_json_empty_forms_impose_no_restriction() {
        assert_eq!(PermissionExpression::from_json(&Value::Null), Ok(None));
        assert_eq!(PermissionExpression::from_json(&json!("")), Ok(None));
        assert_eq!(PermissionExpression::from_json(&json!({})), Ok(None));
    }

    #[test]
    fn test_empty_shorthand_allows_in_code_rules() {
        assert_eq!(PermissionExpression::from(""), PermissionExpression::Always(true));
        assert_eq!(
            PermissionExpression::from("role:admin"),
            PermissionExpression::RoleCheck("admin".to_string())
        );
    }

    #[test]
    fn test_from_json_booleans() {
        assert_eq!(
            PermissionExpression::from_json(&json!(false)),
            Ok(Some(PermissionExpression::Always(false)))
        );
    }

    #[test]
    fn test_from_json_structured() {
        let expression = PermissionExpression::from_json(&json!({
            "roles": ["admin", "hr"],
            "allow_self": true,
            "gate": "view-salary",
            "tenant": "acme"
        }))
        .unwrap()
        .unwrap();

        let PermissionExpression::Structured(policy) = expression else {
            panic!("expected a structured policy");
        };
        assert_eq!(
            policy.roles,
            Some(vec!["admin".to_string(), "hr".to_string()])
        );
        assert_eq!(policy.allow_self, Some(true));
        assert_eq!(policy.gate.as_deref(), Some("view-salary"));
        assert_eq!(policy.extra.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_from_json_null_clauses_are_absent() {
        let expression = PermissionExpression::from_json(&json!({"roles": null, "gate": "g"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            expression,
            PermissionExpression::Structured(StructuredPolicy::default().gate("g"))
        );
    }

    #[test]
    fn test_from_json_rejects_unsupported_shapes() {
        assert_eq!(
            PermissionExpression::from_json(&json!(1)),
            Err(PolicyParseError::UnsupportedShape("number"))
        );
        assert_eq!(
            PermissionExpression::from_json(&json!(["admin"])),
            Err(PolicyParseError::UnsupportedShape("array"))
        );
        assert!(matches!(
            PermissionExpression::from_json(&json!({"roles": "admin"})),
            Err(PolicyParseError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_callable_equality_is_by_identity() {
        let a = PermissionExpression::callable(|_, _| true);
        let b = PermissionExpression::callable(|_, _| true);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(!a.is_serializable());
        assert_eq!(format!("{a:?}"), "Callable(..)");
    }

    #[test]
    fn test_structured_policy_serializes_sparse() {
        let policy = StructuredPolicy::roles(["admin"]).allow_self(true);
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({"roles": ["admin"], "allow_self": true})
        );
    }
}
