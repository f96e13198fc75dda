//! Actor capability.
//!
//! An actor is whoever reads or writes a record. The engine needs two things
//! from it: an identifier comparable with a record's primary key, and
//! optionally a way to ask whether it holds a role.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The acting identity a field decision is made for.
pub trait Actor: Send + Sync {
    /// Identifier compared against a record's primary-key value.
    fn id(&self) -> Value;

    /// Whether the actor holds `role`.
    ///
    /// Returns `None` when the actor has no role capability at all, which role
    /// checks treat the same as not holding the role.
    fn has_role(&self, _role: &str) -> Option<bool> {
        None
    }
}

/// A plain actor with an identifier and an optional role set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier (usually the primary key of the actor's own record).
    pub id: Value,

    /// Assigned roles. `None` means the actor cannot answer role queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl Principal {
    /// Creates an actor without role capability.
    #[must_use]
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            roles: None,
        }
    }

    /// Grants the actor a role set.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

impl Actor for Principal {
    fn id(&self) -> Value {
        self.id.clone()
    }

    fn has_role(&self, role: &str) -> Option<bool> {
        self.roles
            .as_ref()
            .map(|roles| roles.iter().any(|r| r == role))
    }
}
