//! A capacity-bounded key/value store whose entries expire a fixed time
//! after insertion.
//!
//! Reads never extend an entry's lifetime and never return an expired entry.
//! When the store is full, expired entries are dropped first, then the
//! oldest insertions.
//!
//! Time is read from [`tokio::time::Instant`] so tests can drive expiry with
//! a paused clock.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Insertion sequence number to key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache. A `capacity` of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns the live value for `key`, dropping it if it has expired.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|e| self.is_expired(e, now));

        if expired {
            self.remove(key);
            return None;
        }

        self.entries.get(key).map(|e| &e.value)
    }

    /// Inserts or replaces `key`, restarting its expiry.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(previous) = self.entries.remove(&key) {
            self.order.remove(&previous.seq);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                seq,
            },
        );

        if self.entries.len() > self.capacity {
            self.purge_expired();
        }
        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry.value)
    }

    /// Drops every expired entry and returns how many were dropped.
    ///
    /// With a fixed TTL, insertion order is expiry order, so the scan stops
    /// at the first live entry.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut purged = 0;

        while let Some((_, key)) = self.order.first_key_value() {
            let live = self
                .entries
                .get(key)
                .is_some_and(|e| !self.is_expired(e, now));
            if live {
                break;
            }
            if let Some((_, key)) = self.order.pop_first() {
                self.entries.remove(&key);
                purged += 1;
            }
        }
        purged
    }

    /// Number of stored entries, including any that have expired but not yet
    /// been dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.ttl
    }
}
