//! Closure-backed named policies.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actor::Actor;
use crate::policy::evaluator::NamedPolicy;
use crate::policy::expression::PolicyFn;
use crate::record::Record;

/// A registry of named checks defined as closures.
///
/// Checks that were never defined deny.
#[derive(Clone, Default)]
pub struct GateRegistry {
    gates: HashMap<String, Arc<PolicyFn>>,
}

impl GateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or replaces) the check `name`.
    #[must_use]
    pub fn define<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&dyn Actor>, &dyn Record) -> bool + Send + Sync + 'static,
    {
        self.gates.insert(name.into(), Arc::new(check));
        self
    }

    /// Returns `true` if `name` is defined.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }
}

impl NamedPolicy for GateRegistry {
    fn allows(&self, name: &str, actor: Option<&dyn Actor>, record: &dyn Record) -> bool {
        match self.gates.get(name) {
            Some(check) => check(actor, record),
            None => {
                tracing::debug!(gate = %name, "Undefined gate denied");
                false
            }
        }
    }
}

impl std::fmt::Debug for GateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.gates.keys().collect();
        names.sort();
        f.debug_struct("GateRegistry").field("gates", &names).finish()
    }
}
