use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Idle slots are dropped once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// One exclusive lock per key (a project, or a project/file pair).
///
/// Mutations on different keys proceed independently; mutations on the
/// same key run one at a time, in arrival order of the underlying mutex.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with<T>(&self, key: K, f: impl FnOnce() -> T) -> T {
        let slot = {
            // The map only holds handles, so a poisoned guard is still usable.
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() >= PRUNE_THRESHOLD {
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots.entry(key).or_default().clone()
        };

        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
