//! Echo suppression.
//!
//! Every change this service applies to one system comes back moments later
//! as a webhook from that system. The gap cache remembers the last value
//! applied per `(entity, kind)` for a short window so that the echo can be
//! recognized and dropped instead of being relayed back again.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TtlCache;
use crate::types::{ChangeEvent, ChangeKind, EntityId, RecordedChange};

pub const DEFAULT_GAP_CAPACITY: usize = 10_000;
pub const DEFAULT_GAP_TTL: Duration = Duration::from_secs(30);

type GapKey = (EntityId, ChangeKind);

pub struct EventGapCache {
    entries: Mutex<TtlCache<GapKey, ChangeEvent>>,
}

impl Default for EventGapCache {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_CAPACITY, DEFAULT_GAP_TTL)
    }
}

impl EventGapCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(TtlCache::new(capacity, ttl)),
        }
    }

    /// Records `event` as the latest value for its `(entity, kind)`.
    pub fn record(&self, event: &ChangeEvent) {
        debug!(entity = %event.entity, kind = %event.kind(), value = %event.value, "Recorded event gap");
        self.lock()
            .insert((event.entity.clone(), event.kind()), event.clone());
    }

    /// Returns true if an unexpired, equivalent event has been recorded.
    pub fn is_equivalent_to_recent(&self, event: &ChangeEvent) -> bool {
        let mut entries = self.lock();
        let Some(recent) = entries.get(&(event.entity.clone(), event.kind())) else {
            return false;
        };

        let similar = recent.is_equivalent(event);
        if similar {
            debug!(
                entity = %event.entity,
                kind = %event.kind(),
                recorded_at = %recent.at,
                "Similar event happened recently"
            );
        }
        similar
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TtlCache<GapKey, ChangeEvent>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A gap entry as posted to the internal endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapEntry {
    pub entity_id: EntityId,
    pub event: RecordedChange,
}

impl GapEntry {
    pub fn from_event(event: &ChangeEvent) -> Self {
        GapEntry {
            entity_id: event.entity.clone(),
            event: RecordedChange::from(event),
        }
    }

    pub fn into_event(self) -> ChangeEvent {
        self.event.into_event(self.entity_id)
    }
}
