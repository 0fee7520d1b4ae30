//! Core domain types for board-sync.
//!
//! Identifiers from both systems are newtyped so that a board id can never be
//! passed where an entity id is expected, and every inbound change is reduced
//! to a [`ChangeEvent`] before the engine looks at it.

pub mod change;
pub mod ids;

pub use change::{ChangeEvent, ChangeKind, ChangeValue, Estimate, RecordedChange, WireChangeError};
pub use ids::{
    BoardId, EntityId, FieldId, IssueNumber, ItemId, PipelineId, RepoRef, ZenHubIssueId,
};
