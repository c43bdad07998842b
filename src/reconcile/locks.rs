//! Per-path exclusion for reconciliation passes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per document path, created on demand and pruned once no
/// pass holds or waits for it
#[derive(Debug, Default)]
pub(crate) struct PathLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no other pass holds `path`
    pub(crate) async fn acquire(&self, path: &str) -> PathGuard<'_> {
        let lock = self.table().entry(path.to_string()).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        PathGuard {
            locks: self,
            path: path.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }
}

pub(crate) struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // An entry is unused once only the table (and, for our own path, this
        // guard) still references it. Entries left behind by cancelled
        // waiters are swept here too.
        self.locks.table().retain(|path, lock| {
            let held_here = usize::from(path == &self.path);
            Arc::strong_count(lock) > 1 + held_here
        });
    }
}
