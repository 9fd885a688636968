use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One mutex per assignment id. Clone, pull and validation of the same
/// assignment never overlap; different assignments proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    locks: Arc<LockMap>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other flow holds the assignment. The lock is released
    /// when the guard is dropped.
    pub async fn acquire(&self, assignment_id: &str) -> SyncGuard {
        let lock = self
            .locks
            .entry(assignment_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        SyncGuard {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            assignment_id: assignment_id.to_string(),
        }
    }
}

/// Holds an assignment's lock. On drop the map entry is pruned unless another
/// flow is already waiting on it.
#[derive(Debug)]
pub struct SyncGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    assignment_id: String,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        // the guard owns a reference to the mutex, release it before counting
        drop(self.guard.take());
        self.locks
            .remove_if(&self.assignment_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
