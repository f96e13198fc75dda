//! Rule types.
//!
//! A rule exists in two forms:
//!
//! - [`RuleRecord`]: the persisted row, with policies as raw JSON
//! - [`Rule`]: the evaluation form, with policies classified into
//!   [`PermissionExpression`]s
//!
//! Conversion happens once per rule when the cache loads the active set.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::policy::{PermissionExpression, PolicyParseError};

// =============================================================================
// Field Action
// =============================================================================

/// Which side of a field a policy guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldAction {
    /// Serialization/output of the field.
    Read,
    /// Modification of the field.
    Write,
}

impl std::fmt::Display for FieldAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

// =============================================================================
// Evaluation Form
// =============================================================================

/// A field rule ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Entity type the rule applies to.
    pub entity_type: String,

    /// Guarded field.
    pub field_name: String,

    /// Read policy; `None` imposes no read restriction.
    pub read_policy: Option<PermissionExpression>,

    /// Write policy; `None` imposes no write restriction.
    pub write_policy: Option<PermissionExpression>,

    /// Substitute value shown when read is denied.
    pub mask: Option<String>,

    /// Inactive rules are never part of the effective rule set.
    pub active: bool,
}

impl Rule {
    /// Creates an active rule without policies.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            field_name: field_name.into(),
            read_policy: None,
            write_policy: None,
            mask: None,
            active: true,
        }
    }

    /// Sets the read policy.
    #[must_use]
    pub fn read(mut self, policy: impl Into<PermissionExpression>) -> Self {
        self.read_policy = Some(policy.into());
        self
    }

    /// Sets the write policy.
    #[must_use]
    pub fn write(mut self, policy: impl Into<PermissionExpression>) -> Self {
        self.write_policy = Some(policy.into());
        self
    }

    /// Sets the mask.
    #[must_use]
    pub fn mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Marks the rule inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The policy guarding `action`, if any.
    #[must_use]
    pub fn policy_for(&self, action: FieldAction) -> Option<&PermissionExpression> {
        match action {
            FieldAction::Read => self.read_policy.as_ref(),
            FieldAction::Write => self.write_policy.as_ref(),
        }
    }

    /// Returns `true` if the rule guards the given entity type and field.
    #[must_use]
    pub fn targets(&self, entity_type: &str, field_name: &str) -> bool {
        self.entity_type == entity_type && self.field_name == field_name
    }
}

// =============================================================================
// Persisted Form
// =============================================================================

/// A rule as held by the rule store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Store-assigned identifier.
    pub id: u64,

    /// Entity type the rule applies to.
    pub entity_type: String,

    /// Guarded field.
    pub field_name: String,

    /// Raw read policy.
    #[serde(default)]
    pub read_policy: Option<Value>,

    /// Raw write policy.
    #[serde(default)]
    pub write_policy: Option<Value>,

    /// Substitute value shown when read is denied.
    #[serde(default)]
    pub mask: Option<String>,

    /// Whether the rule is part of the effective rule set.
    pub is_active: bool,

    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last modification timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RuleRecord {
    /// Creates a persisted record from a definition.
    #[must_use]
    pub fn new(id: u64, definition: NewRule, now: OffsetDateTime) -> Self {
        Self {
            id,
            entity_type: definition.entity_type,
            field_name: definition.field_name,
            read_policy: definition.read_policy,
            write_policy: definition.write_policy,
            mask: definition.mask,
            is_active: definition.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the record's definition, keeping its id and creation time.
    #[must_use]
    pub fn replaced(&self, definition: NewRule, now: OffsetDateTime) -> Self {
        Self {
            created_at: self.created_at,
            ..Self::new(self.id, definition, now)
        }
    }

    /// The record's current definition.
    #[must_use]
    pub fn definition(&self) -> NewRule {
        NewRule {
            entity_type: self.entity_type.clone(),
            field_name: self.field_name.clone(),
            read_policy: self.read_policy.clone(),
            write_policy: self.write_policy.clone(),
            mask: self.mask.clone(),
            is_active: self.is_active,
        }
    }

    /// Classifies the stored policies into an evaluation-form rule.
    ///
    /// # Errors
    ///
    /// Returns an error if either policy is malformed.
    pub fn to_rule(&self) -> Result<Rule, PolicyParseError> {
        Ok(Rule {
            entity_type: self.entity_type.clone(),
            field_name: self.field_name.clone(),
            read_policy: parse_optional(self.read_policy.as_ref())?,
            write_policy: parse_optional(self.write_policy.as_ref())?,
            mask: self.mask.clone(),
            active: self.is_active,
        })
    }
}

fn parse_optional(value: Option<&Value>) -> Result<Option<PermissionExpression>, PolicyParseError> {
    match value {
        Some(value) => PermissionExpression::from_json(value),
        None => Ok(None),
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// A rule definition submitted for creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    /// Entity type the rule applies to.
    pub entity_type: String,

    /// Guarded field.
    pub field_name: String,

    /// Raw read policy.
    #[serde(default)]
    pub read_policy: Option<Value>,

    /// Raw write policy.
    #[serde(default)]
    pub write_policy: Option<Value>,

    /// Substitute value shown when read is denied.
    #[serde(default)]
    pub mask: Option<String>,

    /// Whether the rule is active. Defaults to `true`.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRule {
    /// Creates an active definition without policies.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            field_name: field_name.into(),
            read_policy: None,
            write_policy: None,
            mask: None,
            is_active: true,
        }
    }

    /// Sets the raw read policy.
    #[must_use]
    pub fn with_read_policy(mut self, policy: impl Into<Value>) -> Self {
        self.read_policy = Some(policy.into());
        self
    }

    /// Sets the raw write policy.
    #[must_use]
    pub fn with_write_policy(mut self, policy: impl Into<Value>) -> Self {
        self.write_policy = Some(policy.into());
        self
    }

    /// Sets the mask.
    #[must_use]
    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
}

/// A partial update to an existing rule.
///
/// Outer `None` leaves a field unchanged. For nullable fields `Some(None)`
/// clears the value; in JSON that is an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleChanges {
    /// New entity type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// New field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    /// New raw read policy.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub read_policy: Option<Option<Value>>,

    /// New raw write policy.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub write_policy: Option<Option<Value>>,

    /// New mask.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub mask: Option<Option<String>>,

    /// New active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Maps a present key (even `null`) to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RuleChanges {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the read policy.
    #[must_use]
    pub fn read_policy(mut self, policy: Option<Value>) -> Self {
        self.read_policy = Some(policy);
        self
    }

    /// Replaces the write policy.
    #[must_use]
    pub fn write_policy(mut self, policy: Option<Value>) -> Self {
        self.write_policy = Some(policy);
        self
    }

    /// Replaces the mask.
    #[must_use]
    pub fn mask(mut self, mask: Option<String>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Replaces the active flag.
    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    /// Merges the changes over `current`.
    #[must_use]
    pub fn apply_to(&self, current: &RuleRecord) -> NewRule {
        let mut merged = current.definition();
        if let Some(entity_type) = &self.entity_type {
            merged.entity_type.clone_from(entity_type);
        }
        if let Some(field_name) = &self.field_name {
            merged.field_name.clone_from(field_name);
        }
        if let Some(read_policy) = &self.read_policy {
            merged.read_policy.clone_from(read_policy);
        }
        if let Some(write_policy) = &self.write_policy {
            merged.write_policy.clone_from(write_policy);
        }
        if let Some(mask) = &self.mask {
            merged.mask.clone_from(mask);
        }
        if let Some(active) = self.is_active {
            merged.is_active = active;
        }
        merged
    }

    /// Returns `true` if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
