//! Canonical change events.
//!
//! Every inbound webhook that carries a status or estimate change, from
//! either system, is normalized into a [`ChangeEvent`]. The gap cache and
//! the per-entity lock are keyed on `(EntityId, ChangeKind)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::EntityId;

/// The kind of change an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    StatusUpdate,
    EstimateUpdate,
}

impl ChangeKind {
    /// All kinds, in the order locks must be acquired when a reconciliation
    /// needs more than one.
    pub const ALL: [ChangeKind; 2] = [ChangeKind::StatusUpdate, ChangeKind::EstimateUpdate];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::StatusUpdate => "statusUpdate",
            ChangeKind::EstimateUpdate => "estimateUpdate",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An estimate value as reported by a change.
///
/// `Cleared` is an explicit removal of the estimate, distinct from a change
/// that says nothing about the estimate at all (which is expressed by the
/// absence of an `Estimate`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Estimate {
    Set(f64),
    Cleared,
}

impl Estimate {
    pub fn as_option(&self) -> Option<f64> {
        match self {
            Estimate::Set(v) => Some(*v),
            Estimate::Cleared => None,
        }
    }
}

impl From<Option<f64>> for Estimate {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Estimate::Set(v),
            None => Estimate::Cleared,
        }
    }
}

impl From<Estimate> for Option<f64> {
    fn from(value: Estimate) -> Self {
        value.as_option()
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Set(v) => write!(f, "{v}"),
            Estimate::Cleared => f.write_str("cleared"),
        }
    }
}

/// The new value carried by a change.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeValue {
    /// New status, by option/pipeline name.
    Status(String),
    /// New estimate.
    Estimate(Estimate),
}

impl ChangeValue {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeValue::Status(_) => ChangeKind::StatusUpdate,
            ChangeValue::Estimate(_) => ChangeKind::EstimateUpdate,
        }
    }
}

impl fmt::Display for ChangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeValue::Status(s) => write!(f, "status={s}"),
            ChangeValue::Estimate(e) => write!(f, "estimate={e}"),
        }
    }
}

/// A normalized change to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub entity: EntityId,
    pub value: ChangeValue,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(entity: EntityId, value: ChangeValue) -> Self {
        ChangeEvent {
            entity,
            value,
            at: Utc::now(),
        }
    }

    pub fn status(entity: EntityId, status: impl Into<String>) -> Self {
        Self::new(entity, ChangeValue::Status(status.into()))
    }

    pub fn estimate(entity: EntityId, estimate: Estimate) -> Self {
        Self::new(entity, ChangeValue::Estimate(estimate))
    }

    pub fn kind(&self) -> ChangeKind {
        self.value.kind()
    }

    /// Same entity, same kind, same value. Timestamps are ignored.
    pub fn is_equivalent(&self, other: &ChangeEvent) -> bool {
        self.entity == other.entity && self.value == other.value
    }
}

/// A change without its entity, in the shape exchanged with the internal
/// loopback endpoint:
///
/// ```json
/// { "event": "estimateUpdate", "data": { "newEstimate": 3 }, "timestamp": 1700000000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireChange", into = "WireChange")]
pub struct RecordedChange {
    pub value: ChangeValue,
    pub at: DateTime<Utc>,
}

impl RecordedChange {
    pub fn into_event(self, entity: EntityId) -> ChangeEvent {
        ChangeEvent {
            entity,
            value: self.value,
            at: self.at,
        }
    }
}

impl From<&ChangeEvent> for RecordedChange {
    fn from(event: &ChangeEvent) -> Self {
        RecordedChange {
            value: event.value.clone(),
            at: event.at,
        }
    }
}

/// Error converting a wire change into a [`RecordedChange`].
#[derive(Debug, Error)]
pub enum WireChangeError {
    #[error("missing or invalid field data.{0}")]
    InvalidData(&'static str),

    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireChange {
    event: ChangeKind,
    data: serde_json::Value,
    timestamp: i64,
}

impl TryFrom<WireChange> for RecordedChange {
    type Error = WireChangeError;

    fn try_from(wire: WireChange) -> Result<Self, Self::Error> {
        let value = match wire.event {
            ChangeKind::StatusUpdate => {
                let status = wire
                    .data
                    .get("newStatus")
                    .and_then(|v| v.as_str())
                    .ok_or(WireChangeError::InvalidData("newStatus"))?;
                ChangeValue::Status(status.to_string())
            }
            ChangeKind::EstimateUpdate => {
                // The key must be present; `null` means cleared.
                let raw = wire
                    .data
                    .get("newEstimate")
                    .ok_or(WireChangeError::InvalidData("newEstimate"))?;
                let estimate = if raw.is_null() {
                    Estimate::Cleared
                } else {
                    Estimate::Set(
                        raw.as_f64()
                            .ok_or(WireChangeError::InvalidData("newEstimate"))?,
                    )
                };
                ChangeValue::Estimate(estimate)
            }
        };

        let at = DateTime::from_timestamp_millis(wire.timestamp)
            .ok_or(WireChangeError::InvalidTimestamp(wire.timestamp))?;

        Ok(RecordedChange { value, at })
    }
}

impl From<RecordedChange> for WireChange {
    fn from(change: RecordedChange) -> Self {
        let (event, data) = match change.value {
            ChangeValue::Status(s) => (
                ChangeKind::StatusUpdate,
                serde_json::json!({ "newStatus": s }),
            ),
            ChangeValue::Estimate(e) => (
                ChangeKind::EstimateUpdate,
                serde_json::json!({ "newEstimate": e.as_option() }),
            ),
        };

        WireChange {
            event,
            data,
            timestamp: change.at.timestamp_millis(),
        }
    }
}
