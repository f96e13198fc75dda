//! Field security error types.
//!
//! Runtime field-security evaluation never surfaces these errors: the rule
//! cache recovers from store failures locally. They reach callers only from
//! explicit management operations (rule create/update/delete), configuration,
//! and [`NamedPolicy::authorize`](crate::policy::NamedPolicy::authorize).

use std::fmt;

/// Errors that can occur in field security management operations.
#[derive(Debug, thiserror::Error)]
pub enum FieldGuardError {
    /// A rule definition failed validation.
    #[error("Invalid rule: {message}")]
    InvalidRule {
        /// Description of why the rule is invalid.
        message: String,
    },

    /// No rule exists with the given ID.
    #[error("Rule not found: {id}")]
    RuleNotFound {
        /// The ID that was looked up.
        id: u64,
    },

    /// A rule for the same entity type and field already exists.
    #[error("Rule already exists for {entity_type}.{field_name}")]
    Conflict {
        /// Entity type of the conflicting rule.
        entity_type: String,
        /// Field name of the conflicting rule.
        field_name: String,
    },

    /// The rule store is unreachable or failed.
    #[error("Rule store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// The actor failed a named policy check.
    #[error("Unauthorized: {ability}")]
    Unauthorized {
        /// The named policy that denied the actor.
        ability: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl FieldGuardError {
    /// Creates a new `InvalidRule` error.
    #[must_use]
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }

    /// Creates a new `RuleNotFound` error.
    #[must_use]
    pub fn rule_not_found(id: u64) -> Self {
        Self::RuleNotFound { id }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(entity_type: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type: entity_type.into(),
            field_name: field_name.into(),
        }
    }

    /// Creates a new `Store` error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(ability: impl Into<String>) -> Self {
        Self::Unauthorized {
            ability: ability.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller can fix this error by changing its input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRule { .. }
                | Self::RuleNotFound { .. }
                | Self::Conflict { .. }
                | Self::Unauthorized { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRule { .. } => ErrorCategory::Validation,
            Self::RuleNotFound { .. } => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Validation,
            Self::Store { .. } => ErrorCategory::Infrastructure,
            Self::Unauthorized { .. } => ErrorCategory::Authorization,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of field security errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rule definition or lookup errors.
    Validation,
    /// Rule store failures.
    Infrastructure,
    /// Named policy denials.
    Authorization,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Authorization => write!(f, "authorization"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FieldGuardError::invalid_rule("bad field").to_string(),
            "Invalid rule: bad field"
        );
        assert_eq!(
            FieldGuardError::rule_not_found(7).to_string(),
            "Rule not found: 7"
        );
        assert_eq!(
            FieldGuardError::conflict("User", "ssn").to_string(),
            "Rule already exists for User.ssn"
        );
        assert_eq!(
            FieldGuardError::unauthorized("manage-field-guard").to_string(),
            "Unauthorized: manage-field-guard"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            FieldGuardError::store("down").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            FieldGuardError::unauthorized("x").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            FieldGuardError::configuration("x").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
    }

    #[test]
    fn test_client_errors() {
        assert!(FieldGuardError::invalid_rule("x").is_client_error());
        assert!(FieldGuardError::conflict("User", "ssn").is_client_error());
        assert!(!FieldGuardError::store("x").is_client_error());
        assert!(!FieldGuardError::configuration("x").is_client_error());
    }
}
