//! Custom resolver selection.
//!
//! Resolvers are registered under an identifier as factories. The engine
//! builder looks the configured identifier up once; an unknown identifier or a
//! failing factory falls back to the built-in structured semantics.

use std::collections::HashMap;
use std::sync::Arc;

use crate::policy::evaluator::PolicyResolver;

/// Builds a resolver instance.
pub type ResolverFactory =
    dyn Fn() -> Result<Arc<dyn PolicyResolver>, ResolverError> + Send + Sync;

/// Errors from resolver lookup or construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// No factory is registered under the identifier.
    #[error("Unknown policy resolver: {0}")]
    Unknown(String),

    /// The factory failed to build the resolver.
    #[error("Failed to construct policy resolver {id}: {message}")]
    Construction {
        /// Resolver identifier.
        id: String,
        /// Failure description.
        message: String,
    },
}

impl ResolverError {
    /// Creates a new `Construction` error.
    #[must_use]
    pub fn construction(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Resolver factories keyed by identifier.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    factories: HashMap<String, Arc<ResolverFactory>>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `id`.
    #[must_use]
    pub fn register<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn PolicyResolver>, ResolverError> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// Registers a ready resolver under `id`.
    #[must_use]
    pub fn register_instance(self, id: impl Into<String>, resolver: Arc<dyn PolicyResolver>) -> Self {
        self.register(id, move || Ok(Arc::clone(&resolver)))
    }

    /// Builds the resolver registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Unknown` if nothing is registered under `id`,
    /// or the factory's own error.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn PolicyResolver>, ResolverError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ResolverError::Unknown(id.to_string()))?;
        factory()
    }

    /// Resolves an optional identifier, falling back to `None` on failure.
    ///
    /// Failures are logged and never propagated.
    #[must_use]
    pub fn select(&self, id: Option<&str>) -> Option<Arc<dyn PolicyResolver>> {
        let id = id?;
        match self.resolve(id) {
            Ok(resolver) => {
                tracing::debug!(resolver = %id, "Custom policy resolver selected");
                Some(resolver)
            }
            Err(e) => {
                tracing::warn!(
                    resolver = %id,
                    error = %e,
                    "Custom policy resolver unavailable, using default resolution"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &ids)
            .finish()
    }
}
