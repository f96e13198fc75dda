//! FieldGuard configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! custom_resolver = "tenant-aware"
//! cache_key = "fieldguard:rules"
//! automatic_enforcement = true
//! validation_mode = "permissive"
//! ```

use serde::{Deserialize, Serialize};

/// Default key the active rule snapshot is cached under.
pub const DEFAULT_CACHE_KEY: &str = "fieldguard:rules";

/// Root configuration for the field security engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldGuardConfig {
    /// Identifier of a custom structured-policy resolver.
    /// Looked up once in the resolver registry when the engine is built.
    pub custom_resolver: Option<String>,

    /// Key the active rule snapshot is cached under.
    pub cache_key: String,

    /// Register read/write security on the record lifecycle at boot.
    pub automatic_enforcement: bool,

    /// How rule definitions are checked against entity metadata.
    pub validation_mode: ValidationMode,
}

impl Default for FieldGuardConfig {
    fn default() -> Self {
        Self {
            custom_resolver: None,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            automatic_enforcement: false,
            validation_mode: ValidationMode::default(),
        }
    }
}

/// Rule field validation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Accept a known column when the schema is available, otherwise fall back
    /// to fillable, guarded, and primary-key attributes.
    #[default]
    Permissive,
    /// Require schema introspection and accept known columns only.
    Strict,
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl FieldGuardConfig {
    /// Parses and validates a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::InvalidValue` if validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The cache key is empty
    /// - The custom resolver identifier is set but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "cache_key cannot be empty".to_string(),
            ));
        }

        if let Some(resolver) = &self.custom_resolver
            && resolver.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "custom_resolver cannot be an empty identifier".to_string(),
            ));
        }

        Ok(())
    }
}
