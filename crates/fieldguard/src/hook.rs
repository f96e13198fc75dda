//! Lifecycle enforcement.
//!
//! With automatic enforcement enabled, read security runs on every record
//! after it is retrieved and write security runs before it is persisted. The
//! host record system exposes the two lifecycle points through
//! [`RecordLifecycle`]; the acting identity comes from an [`ActorSource`].

use std::sync::{Arc, PoisonError, RwLock};

use crate::actor::Actor;
use crate::engine::FieldGuard;
use crate::record::Record;

// =============================================================================
// Lifecycle Capability
// =============================================================================

/// Points in a record's lifecycle where security is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePoint {
    /// After a record is loaded from storage.
    PostRetrieve,
    /// Before a record is written to storage.
    PrePersist,
}

/// Callback run at a lifecycle point.
pub type LifecycleListener = Arc<dyn Fn(&mut dyn Record) + Send + Sync>;

/// Host record lifecycle.
pub trait RecordLifecycle {
    /// Runs `listener` at `point` for records of every entity type.
    fn register(&self, point: LifecyclePoint, listener: LifecycleListener);
}

/// Supplies the current actor to lifecycle listeners.
pub trait ActorSource: Send + Sync {
    /// The actor on whose behalf the current operation runs.
    fn current_actor(&self) -> Option<Arc<dyn Actor>>;
}

impl<F> ActorSource for F
where
    F: Fn() -> Option<Arc<dyn Actor>> + Send + Sync,
{
    fn current_actor(&self) -> Option<Arc<dyn Actor>> {
        self()
    }
}

// =============================================================================
// Enforcement Hook
// =============================================================================

/// Installs field security on a record lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct EnforcementHook;

impl EnforcementHook {
    /// Registers read security on [`LifecyclePoint::PostRetrieve`] and write
    /// security on [`LifecyclePoint::PrePersist`].
    ///
    /// Prefer [`FieldGuard::enable_automatic_enforcement`], which installs at
    /// most once per engine.
    pub fn install(
        guard: Arc<FieldGuard>,
        lifecycle: &dyn RecordLifecycle,
        actors: Arc<dyn ActorSource>,
    ) {
        let read_guard = Arc::clone(&guard);
        let read_actors = Arc::clone(&actors);
        lifecycle.register(
            LifecyclePoint::PostRetrieve,
            Arc::new(move |record: &mut dyn Record| {
                let actor = read_actors.current_actor();
                read_guard.apply_read_security(record, actor.as_deref());
            }),
        );

        lifecycle.register(
            LifecyclePoint::PrePersist,
            Arc::new(move |record: &mut dyn Record| {
                let actor = actors.current_actor();
                guard.apply_write_security(record, actor.as_deref());
            }),
        );
    }
}

// =============================================================================
// Lifecycle Registry
// =============================================================================

/// In-process [`RecordLifecycle`] for hosts without their own event system.
#[derive(Default)]
pub struct LifecycleRegistry {
    listeners: RwLock<Vec<(LifecyclePoint, LifecycleListener)>>,
}

impl LifecycleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every listener registered at `point` on `record`, in
    /// registration order. Returns how many ran.
    pub fn dispatch(&self, point: LifecyclePoint, record: &mut dyn Record) -> usize {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(p, _)| *p == point)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(&mut *record);
        }
        listeners.len()
    }

    /// Number of listeners registered at `point`.
    #[must_use]
    pub fn listener_count(&self, point: LifecyclePoint) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(p, _)| *p == point)
            .count()
    }
}

impl RecordLifecycle for LifecycleRegistry {
    fn register(&self, point: LifecyclePoint, listener: LifecycleListener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((point, listener));
    }
}

impl std::fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("post_retrieve", &self.listener_count(LifecyclePoint::PostRetrieve))
            .field("pre_persist", &self.listener_count(LifecyclePoint::PrePersist))
            .finish()
    }
}
