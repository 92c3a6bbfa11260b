//! Per-key async mutual exclusion

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<String, Arc<AsyncMutex<()>>>;

/// A set of named async locks created on demand.
///
/// Tasks locking the same key run one at a time; different keys never
/// contend. An entry is removed once no task holds or waits on it.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Holds one key of a [`KeyedLocks`] until dropped
pub struct KeyGuard {
    // Field order matters: the mutex guard is released before the slot.
    _guard: OwnedMutexGuard<()>,
    _slot: Slot,
}

/// A task's claim on a table entry, held while waiting and while locked.
struct Slot {
    key: String,
    table: Arc<Mutex<LockTable>>,
    lock: Arc<AsyncMutex<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut entries = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Slot {
                key: key.to_string(),
                table: Arc::clone(&self.table),
                lock: Arc::clone(entries.entry(key.to_string()).or_default()),
            }
        };
        // A cancelled wait drops `slot` here too, so the entry is still released.
        let guard = Arc::clone(&slot.lock).lock_owned().await;

        KeyGuard {
            _guard: guard,
            _slot: slot,
        }
    }

    /// Number of keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut entries = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here: nobody else holds or waits.
        if Arc::strong_count(&self.lock) == 2 {
            entries.remove(&self.key);
        }
        // Entries only the table still references are idle.
        entries.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
