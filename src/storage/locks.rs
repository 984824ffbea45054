use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mutual exclusion per key, e.g. per sender address.
/// Holders of different keys never wait on each other.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    // K -> lock slot, dropped again once nobody holds or waits on it
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> KeyedLocks {
        KeyedLocks::default()
    }

    /// Runs `f` while holding the lock for `key`
    pub fn run<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.table();
            slots.entry(key.to_string()).or_default().clone()
        };

        let result = {
            let _guard = lock_recovering(&slot);
            f()
        };

        let mut slots = self.table();
        // One reference in the table, one here: nobody else is waiting
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        result
    }

    /// Number of keys currently locked or contended
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        lock_recovering(&self.slots)
    }
}

// A panic inside a critical section leaves no partial state behind the mutex,
// so a poisoned lock is taken over as is
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Recovering poisoned lock");
            poisoned.into_inner()
        }
    }
}
