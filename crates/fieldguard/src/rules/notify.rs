//! Rule change notification.
//!
//! A [`RuleRepository`](crate::rules::RuleRepository) invalidates its own
//! cache synchronously. Other caches over the same store learn about the
//! change through a [`RuleChangeNotifier`]:
//!
//! ```ignore
//! use fieldguard::rules::{RuleChangeNotifier, spawn_invalidation_listener};
//! use std::sync::Arc;
//!
//! let notifier = Arc::new(RuleChangeNotifier::new(64));
//! let handle = spawn_invalidation_listener(other_cache, notifier.subscribe());
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::rules::cache::RuleCache;

// =============================================================================
// Rule Change Types
// =============================================================================

/// A change to the persisted rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleChange {
    /// A rule was created.
    Created {
        /// The ID of the created rule.
        rule_id: u64,
    },
    /// A rule was updated.
    Updated {
        /// The ID of the updated rule.
        rule_id: u64,
    },
    /// A rule was deleted.
    Deleted {
        /// The ID of the deleted rule.
        rule_id: u64,
    },
    /// The cache was cleared explicitly.
    CacheCleared,
}

impl RuleChange {
    /// Get the rule ID if this is a single-rule change.
    #[must_use]
    pub fn rule_id(&self) -> Option<u64> {
        match self {
            Self::Created { rule_id } | Self::Updated { rule_id } | Self::Deleted { rule_id } => {
                Some(*rule_id)
            }
            Self::CacheCleared => None,
        }
    }
}

// =============================================================================
// Rule Change Notifier
// =============================================================================

/// Pending changes a slow listener may fall behind by before it lags.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// Fans rule changes out to every cache listening on other handles.
pub struct RuleChangeNotifier {
    sender: broadcast::Sender<RuleChange>,
}

impl RuleChangeNotifier {
    /// A notifier buffering up to `capacity` changes per listener.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::Sender::new(capacity),
        }
    }

    /// Publishes `change`; returns how many listeners will see it.
    pub fn notify(&self, change: RuleChange) -> usize {
        let reached = self.sender.send(change).unwrap_or(0);
        tracing::trace!(listeners = reached, "Rule change published");
        reached
    }

    /// A receiver for changes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuleChange> {
        self.sender.subscribe()
    }

    /// Keeps `cache` in step with this notifier.
    ///
    /// The listener stops once every notifier handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn attach(&self, cache: Arc<RuleCache>) -> JoinHandle<()> {
        spawn_invalidation_listener(cache, self.subscribe())
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RuleChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_CAPACITY)
    }
}

impl std::fmt::Debug for RuleChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// =============================================================================
// Invalidation Listener
// =============================================================================

/// Invalidates `cache` on every received change until the channel closes.
///
/// Missed notifications also invalidate.
pub async fn run_invalidation_listener(
    cache: Arc<RuleCache>,
    mut receiver: broadcast::Receiver<RuleChange>,
) {
    loop {
        match receiver.recv().await {
            Ok(change) => {
                tracing::debug!(
                    cache_key = %cache.cache_key(),
                    change = ?change,
                    "Rule change received"
                );
                cache.invalidate();
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(
                    cache_key = %cache.cache_key(),
                    missed,
                    "Missed rule change notifications"
                );
                cache.invalidate();
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!(cache_key = %cache.cache_key(), "Rule change channel closed");
                break;
            }
        }
    }
}

/// Spawns [`run_invalidation_listener`] on the current tokio runtime.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_invalidation_listener(
    cache: Arc<RuleCache>,
    receiver: broadcast::Receiver<RuleChange>,
) -> JoinHandle<()> {
    tokio::spawn(run_invalidation_listener(cache, receiver))
}
