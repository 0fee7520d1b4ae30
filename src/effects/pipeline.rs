//! ZenHub effect types.
//!
//! Every ZenHub operation is scoped to the workspace the interpreter was
//! built for, so effects carry no workspace id.

use serde::{Deserialize, Serialize};

use crate::config::Pipeline;
use crate::types::{EntityId, Estimate, IssueNumber, PipelineId, ZenHubIssueId};

/// A ZenHub operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEffect {
    /// Resolve the ZenHub issue for a GitHub repository id and number.
    GetIssue {
        repository_gh_id: u64,
        number: IssueNumber,
    },

    /// Move an issue to a pipeline.
    MoveIssue {
        issue: ZenHubIssueId,
        pipeline: PipelineId,
    },

    /// Set or clear an issue's estimate.
    SetEstimate {
        issue: ZenHubIssueId,
        estimate: Estimate,
    },

    /// List the workspace's pipelines.
    ListPipelines,

    /// One page of the workspace's repositories.
    ListRepositories { after: Option<String> },

    /// One page of issues in a pipeline, restricted to `repositories`.
    SearchPipelineIssues {
        pipeline: PipelineId,
        repositories: Vec<String>,
        after: Option<String>,
    },
}

/// A ZenHub issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZenHubIssue {
    pub id: ZenHubIssueId,
    pub title: String,
}

/// A repository connected to the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRepository {
    /// ZenHub repository id.
    pub id: String,
    pub name: String,
}

/// An issue as listed by a pipeline search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIssue {
    pub id: ZenHubIssueId,
    pub number: IssueNumber,
    /// The GitHub node id of the issue.
    pub gh_node_id: EntityId,
    pub repository: WorkspaceRepository,
    pub labels: Vec<String>,
    pub estimate: Option<f64>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub nodes: Vec<T>,
    /// Cursor for the next page, or `None` on the last page.
    pub next: Option<String>,
}

/// Response from a pipeline effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelineResponse {
    /// Response to `GetIssue`.
    Issue(ZenHubIssue),

    /// Response to `MoveIssue`.
    Moved,

    /// Response to `SetEstimate`.
    EstimateSet,

    /// Response to `ListPipelines`.
    Pipelines(Vec<Pipeline>),

    /// Response to `ListRepositories`.
    Repositories(Page<WorkspaceRepository>),

    /// Response to `SearchPipelineIssues`.
    PipelineIssues(Page<PipelineIssue>),
}
