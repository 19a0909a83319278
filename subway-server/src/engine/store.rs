//! The snapshot store: one live snapshot, swapped atomically.
//!
//! Builds happen entirely outside the lock, against private working state;
//! the lock is held only for the instant of cloning out the live `Arc` or
//! swapping in a newly built snapshot. Readers therefore never block on an
//! in-progress rebuild.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::Snapshot;

/// Holds the current snapshot reference and publishes replacements.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Return the current snapshot reference.
    ///
    /// The returned `Arc` stays valid (and immutable) even if a newer
    /// snapshot is published while the caller still holds it.
    pub async fn read(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Publish a newly built snapshot.
    ///
    /// Concurrent rebuilds may race here; a snapshot older than the live one
    /// is discarded so that visibility stays monotonic. Returns whether the
    /// snapshot was published.
    pub async fn publish(&self, snapshot: Snapshot) -> bool {
        let mut guard = self.current.write().await;
        if snapshot.built_at() < guard.built_at() {
            debug!(
                built_at = %snapshot.built_at(),
                live = %guard.built_at(),
                "discarding snapshot older than the live one"
            );
            return false;
        }
        *guard = Arc::new(snapshot);
        true
    }
}
