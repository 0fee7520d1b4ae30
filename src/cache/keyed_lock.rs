//! Per-key async mutex.
//!
//! At most one holder per key; later callers for the same key wait and are
//! admitted in arrival order (tokio's mutex is fair). Different keys never
//! contend, and the table lock is only held while looking up or cleaning up a
//! slot, never while the caller's work runs.
//!
//! A slot is removed from the table when its last holder releases it with no
//! one else waiting.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

pub struct KeyedMutex<K> {
    slots: Slots<K>,
}

impl<K> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let slot = {
            let mut slots = lock_table(&self.slots);
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.clone().lock_owned().await;

        KeyedGuard {
            key,
            slots: Arc::clone(&self.slots),
            slot,
            guard: Some(guard),
        }
    }

    /// Runs `f` while holding `key`. The lock is released whether `f`
    /// succeeds or fails.
    pub async fn with_lock<F, Fut>(&self, key: K, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _guard = self.lock(key).await;
        f().await
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        lock_table(&self.slots).len()
    }
}

/// Exclusive access to one key. Released on drop.
pub struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    slots: Slots<K>,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = lock_table(&self.slots);
        // One reference in the table and one here: nobody is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

fn lock_table<K>(slots: &Slots<K>) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    // The table is never left inconsistent by a panic, so poisoning is ignored.
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
