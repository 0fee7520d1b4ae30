//! GitHub project board effect types.
//!
//! These describe GraphQL operations against GitHub issues, pull requests
//! and Projects V2 boards. The octocrab interpreter in `crate::github`
//! executes them; tests interpret them with a recording mock.

use serde::{Deserialize, Serialize};

use crate::types::{BoardId, EntityId, FieldId, IssueNumber, ItemId, RepoRef};

/// A GitHub board or entity operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEffect {
    // ─── Entity Queries ───────────────────────────────────────────────────────
    /// Look up an issue or pull request by repository name and number.
    GetEntityByNumber { repo: String, number: IssueNumber },

    /// Look up an issue or pull request by its node id.
    GetEntityByContentId { content: EntityId },

    /// List the boards an entity is currently on.
    ListEntityBoards { repo: String, number: IssueNumber },

    /// Read the status and estimate of a board item, by field name.
    GetItemState {
        item: ItemId,
        status_field: String,
        estimate_field: String,
    },

    /// Look up an organization project by number, with its fields.
    GetProjectBoard { number: u64 },

    // ─── Board Mutations ──────────────────────────────────────────────────────
    /// Add an entity to a board. Returns the existing item if already there.
    AddToBoard { board: BoardId, content: EntityId },

    /// Set a single-select field to an option.
    SetStatus {
        board: BoardId,
        item: ItemId,
        field: FieldId,
        option_id: String,
    },

    /// Set a number field.
    SetEstimate {
        board: BoardId,
        item: ItemId,
        field: FieldId,
        value: f64,
    },

    /// Clear any field's value.
    ClearField {
        board: BoardId,
        item: ItemId,
        field: FieldId,
    },

    /// Delete an item from a board.
    RemoveItem { board: BoardId, item: ItemId },
}

impl BoardEffect {
    /// Returns true if this effect writes to GitHub.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            BoardEffect::AddToBoard { .. }
                | BoardEffect::SetStatus { .. }
                | BoardEffect::SetEstimate { .. }
                | BoardEffect::ClearField { .. }
                | BoardEffect::RemoveItem { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// An issue or pull request with the data needed to route it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub number: IssueNumber,
    pub repository: RepoRef,
    pub labels: Vec<String>,
}

/// An entity's item on one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    pub board: BoardId,
    pub item: ItemId,
}

/// Status and estimate of an item as stored on a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub status: Option<String>,
    pub estimate: Option<f64>,
}

/// An organization project and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBoard {
    pub id: BoardId,
    pub title: String,
    pub closed: bool,
    pub fields: Vec<ProjectField>,
}

impl ProjectBoard {
    pub fn field(&self, name: &str) -> Option<&ProjectField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectField {
    pub id: FieldId,
    pub name: String,
    pub kind: ProjectFieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectFieldKind {
    SingleSelect { options: Vec<FieldOption> },
    Number,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

/// Response from a board effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BoardResponse {
    /// Response to `GetEntityByNumber` and `GetEntityByContentId`.
    Entity(EntityInfo),

    /// Response to `ListEntityBoards`.
    Boards(Vec<BoardItem>),

    /// Response to `GetItemState`.
    ItemState(ItemState),

    /// Response to `GetProjectBoard`.
    ProjectBoard(ProjectBoard),

    /// Response to `AddToBoard`.
    ItemAdded(ItemId),

    /// Response to `SetStatus`, `SetEstimate` and `ClearField`.
    FieldUpdated,

    /// Response to `RemoveItem`.
    ItemRemoved,
}
