use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries beyond this count trigger a sweep of locks nobody holds.
const SWEEP_THRESHOLD: usize = 1024;

/// Table of async mutexes keyed by record id, so updates to one record are serialized while
/// unrelated records proceed in parallel.
pub(crate) struct KeyedLocks<K> {
    entries: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.len() >= SWEEP_THRESHOLD {
                entries.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            entries.entry(key.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
