//! Normalized webhook events.
//!
//! GitHub delivers `issues`, `pull_request` and `projects_v2_item` events;
//! ZenHub delivers pipeline and estimate changes. The parsers reduce both to
//! the handful of shapes the reconciler acts on. Everything else is dropped
//! during parsing.

use serde::{Deserialize, Serialize};

use crate::types::{BoardId, EntityId, Estimate, IssueNumber, RepoRef};

/// A GitHub event the reconciler acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GitHubEvent {
    /// An issue or pull request changed state or labels.
    Entity(EntityEvent),

    /// A field of an item on a project board was edited.
    ProjectField(ProjectFieldEvent),
}

impl GitHubEvent {
    /// Repository the delivery came from, if the payload names one.
    ///
    /// Organization-level project events may not.
    pub fn repository_name(&self) -> Option<&str> {
        match self {
            GitHubEvent::Entity(e) => Some(&e.repo.name),
            GitHubEvent::ProjectField(e) => e.repository.as_deref(),
        }
    }
}

/// Issue and pull request actions that affect board placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Opened,
    Reopened,
    Closed,
    Labeled,
    Unlabeled,
}

/// An `issues` or `pull_request` delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub repo: RepoRef,
    pub number: IssueNumber,
    pub action: EntityAction,
}

/// New value of an edited project field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A single-select field. `None` when the value was cleared.
    SingleSelect(Option<String>),

    /// A number field.
    Number(Estimate),
}

/// A `projects_v2_item` `edited` delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFieldEvent {
    /// The board the edit was made on.
    pub board: BoardId,
    /// Node id of the issue or pull request behind the item.
    pub content: EntityId,
    pub repository: Option<String>,
    pub field_name: String,
    pub value: FieldValue,
}

/// A ZenHub delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZenHubEvent {
    pub organization: String,
    pub repo: String,
    pub number: IssueNumber,
    pub kind: ZenHubEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZenHubEventKind {
    EstimateSet(f64),
    EstimateCleared,

    /// The issue moved to another pipeline.
    IssueTransfer {
        workspace_id: String,
        to_pipeline: String,
    },

    /// The issue changed position within a pipeline. Not synchronized.
    IssueReprioritized,
}

impl ZenHubEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ZenHubEventKind::EstimateSet(_) => "estimate_set",
            ZenHubEventKind::EstimateCleared => "estimate_cleared",
            ZenHubEventKind::IssueTransfer { .. } => "issue_transfer",
            ZenHubEventKind::IssueReprioritized => "issue_reprioritized",
        }
    }
}
