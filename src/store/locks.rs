//! Per-key mutual exclusion.
//!
//! Two operations on the same game (or the same channel, or the same player's
//! debts) run one after the other; operations on different keys run in
//! parallel. Each key gets its own mutex, created on first use and dropped
//! once nobody holds or waits for it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// Registry of per-key locks.
#[derive(Debug, Default)]
pub struct GameLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GameLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        let result = {
            let _guard = slot.lock();
            trace!(key, "Lock acquired");
            f()
        };
        drop(slot);
        self.prune(key);
        result
    }

    /// Number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no key has a live lock.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, key: &str) {
        let mut slots = self.slots.lock();
        // The registry holds one reference; any other means a holder or waiter.
        if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(key);
        }
    }
}
