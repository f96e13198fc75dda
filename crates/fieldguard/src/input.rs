//! Request input filtering.
//!
//! Strips write input keys the actor may not set, for several entity types at
//! once. Safe methods (`GET`, `HEAD`, `OPTIONS`, `TRACE`) never write, so
//! their input passes through untouched.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::actor::Actor;
use crate::engine::{FieldGuard, WriteTarget};

/// Returns `true` for request methods that do not modify state.
///
/// Comparison ignores ASCII case.
#[must_use]
pub fn is_safe_method(method: &str) -> bool {
    ["GET", "HEAD", "OPTIONS", "TRACE"]
        .iter()
        .any(|safe| method.eq_ignore_ascii_case(safe))
}

/// Applies write filtering to request input.
#[derive(Debug, Clone)]
pub struct InputFilter {
    guard: Arc<FieldGuard>,
}

impl InputFilter {
    /// Creates a filter over `guard`.
    #[must_use]
    pub fn new(guard: Arc<FieldGuard>) -> Self {
        Self { guard }
    }

    /// Filters `input` against each of `entity_types` in turn.
    ///
    /// Each entity type sees the output of the previous one. Safe methods
    /// and an empty type list return `input` unchanged.
    pub fn filter<S: AsRef<str>>(
        &self,
        method: &str,
        entity_types: &[S],
        input: Map<String, Value>,
        actor: Option<&dyn Actor>,
    ) -> Map<String, Value> {
        if entity_types.is_empty() || is_safe_method(method) {
            return input;
        }

        let before = input.len();
        let filtered = entity_types.iter().fold(input, |data, entity_type| {
            self.guard
                .filter_write_attributes(WriteTarget::Type(entity_type.as_ref()), data, actor)
        });

        if filtered.len() < before {
            tracing::debug!(
                method = %method,
                removed = before - filtered.len(),
                "Unauthorized input fields removed"
            );
        }
        filtered
    }
}
