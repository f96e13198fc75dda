//! Rule definition validation.

use std::sync::Arc;

use crate::FieldGuardResult;
use crate::config::ValidationMode;
use crate::error::FieldGuardError;
use crate::policy::PermissionExpression;
use crate::rules::catalog::{EntityCatalog, EntityDescriptor, EntityLookup};
use crate::rules::rule::NewRule;

/// Maximum length of a field name, in characters.
pub const MAX_FIELD_NAME_LEN: usize = 255;

/// Maximum length of a mask, in characters.
pub const MAX_MASK_LEN: usize = 255;

/// Checks rule definitions against entity metadata.
#[derive(Clone)]
pub struct RuleValidator {
    catalog: Arc<dyn EntityCatalog>,
    mode: ValidationMode,
}

impl RuleValidator {
    /// Creates a validator over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn EntityCatalog>, mode: ValidationMode) -> Self {
        Self { catalog, mode }
    }

    /// The validation mode in use.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validates `rule`.
    ///
    /// # Errors
    ///
    /// Returns `FieldGuardError::InvalidRule` if:
    /// - The field name is empty or too long, or the mask is too long
    /// - The entity type is unknown or not a record type
    /// - The field does not exist on the entity
    /// - A policy is malformed
    pub fn validate(&self, rule: &NewRule) -> FieldGuardResult<()> {
        if rule.field_name.is_empty() {
            return Err(FieldGuardError::invalid_rule("field_name is required"));
        }
        if rule.field_name.chars().count() > MAX_FIELD_NAME_LEN {
            return Err(FieldGuardError::invalid_rule(format!(
                "field_name may not be greater than {MAX_FIELD_NAME_LEN} characters"
            )));
        }
        if let Some(mask) = &rule.mask
            && mask.chars().count() > MAX_MASK_LEN
        {
            return Err(FieldGuardError::invalid_rule(format!(
                "mask may not be greater than {MAX_MASK_LEN} characters"
            )));
        }

        let descriptor = match self.catalog.lookup(&rule.entity_type) {
            EntityLookup::Record(descriptor) => descriptor,
            EntityLookup::NotARecord => {
                return Err(FieldGuardError::invalid_rule(format!(
                    "'{}' is not a record type",
                    rule.entity_type
                )));
            }
            EntityLookup::Unknown => {
                return Err(FieldGuardError::invalid_rule(format!(
                    "Entity type '{}' does not exist",
                    rule.entity_type
                )));
            }
        };

        self.check_field(&descriptor, &rule.field_name)?;

        for (name, policy) in [
            ("read_policy", &rule.read_policy),
            ("write_policy", &rule.write_policy),
        ] {
            if let Some(policy) = policy {
                PermissionExpression::from_json(policy).map_err(|e| {
                    FieldGuardError::invalid_rule(format!("{name} is invalid: {e}"))
                })?;
            }
        }

        Ok(())
    }

    fn check_field(&self, descriptor: &EntityDescriptor, field: &str) -> FieldGuardResult<()> {
        let exists = match (self.mode, descriptor.has_column(field)) {
            (_, Some(true)) => true,
            (ValidationMode::Strict, Some(false)) => false,
            (ValidationMode::Strict, None) => {
                return Err(FieldGuardError::invalid_rule(format!(
                    "Schema for '{}' is unavailable; strict validation requires it",
                    descriptor.entity_type
                )));
            }
            (ValidationMode::Permissive, _) => descriptor.declares(field),
        };

        if exists {
            Ok(())
        } else {
            Err(FieldGuardError::invalid_rule(format!(
                "Field '{field}' does not exist on '{}'",
                descriptor.entity_type
            )))
        }
    }
}

impl std::fmt::Debug for RuleValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleValidator")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::catalog::EntityRegistry;
    use serde_json::json;

    fn catalog() -> Arc<dyn EntityCatalog> {
        Arc::new(
            EntityRegistry::new()
                .with_entity(
                    EntityDescriptor::new("User")
                        .with_fillable(["name", "email"])
                        .with_guarded(["role"]),
                )
                .with_entity(
                    EntityDescriptor::new("Employee")
                        .with_fillable(["name"])
                        .with_columns(["id", "name", "salary"]),
                )
                .with_non_record("Helpers"),
        )
    }

    fn permissive() -> RuleValidator {
        RuleValidator::new(catalog(), ValidationMode::Permissive)
    }

    fn message(result: FieldGuardResult<()>) -> String {
        match result {
            Err(FieldGuardError::InvalidRule { message }) => message,
            other => panic!("expected InvalidRule, got {other:?}"),
        }
    }

    #[test]
    fn test_permissive_accepts_declared_fields() {
        let v = permissive();
        assert!(v.validate(&NewRule::new("User", "email")).is_ok());
        assert!(v.validate(&NewRule::new("User", "role")).is_ok());
        assert!(v.validate(&NewRule::new("User", "id")).is_ok());
    }

    #[test]
    fn test_permissive_accepts_columns() {
        let v = permissive();
        assert!(v.validate(&NewRule::new("Employee", "salary")).is_ok());
    }

    #[test]
    fn test_permissive_rejects_unknown_field() {
        let msg = message(permissive().validate(&NewRule::new("User", "ssn")));
        assert!(msg.contains("'ssn' does not exist"));
    }

    #[test]
    fn test_rejects_unknown_or_non_record_entity() {
        let v = permissive();
        assert!(message(v.validate(&NewRule::new("Ghost", "name"))).contains("does not exist"));
        assert!(message(v.validate(&NewRule::new("Helpers", "name"))).contains("not a record type"));
    }

    #[test]
    fn test_strict_requires_schema_column() {
        let v = RuleValidator::new(catalog(), ValidationMode::Strict);
        assert!(v.validate(&NewRule::new("Employee", "salary")).is_ok());
        assert!(v.validate(&NewRule::new("Employee", "bonus")).is_err());
        assert!(message(v.validate(&NewRule::new("User", "email"))).contains("strict"));
    }

    #[test]
    fn test_length_limits() {
        let v = permissive();
        assert!(message(v.validate(&NewRule::new("User", ""))).contains("required"));

        let long = "x".repeat(MAX_FIELD_NAME_LEN + 1);
        assert!(message(v.validate(&NewRule::new("User", long))).contains("255"));

        let rule = NewRule::new("User", "email").with_mask("*".repeat(MAX_MASK_LEN + 1));
        assert!(message(v.validate(&rule)).contains("mask"));

        let rule = NewRule::new("User", "email").with_mask("*".repeat(MAX_MASK_LEN));
        assert!(v.validate(&rule).is_ok());
    }

    #[test]
    fn test_rejects_malformed_policy() {
        let v = permissive();
        let rule = NewRule::new("User", "email").with_write_policy(json!(3));
        assert!(message(v.validate(&rule)).contains("write_policy"));

        let rule = NewRule::new("User", "email")
            .with_read_policy(json!({"roles": ["admin"], "allow_self": true}));
        assert!(v.validate(&rule).is_ok());
    }
}
