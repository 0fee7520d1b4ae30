use serde::Deserialize;
use serde_json::json;

use crate::config::Pipeline;
use crate::effects::{
    Page, PipelineEffect, PipelineInterpreter, PipelineIssue, PipelineResponse, WorkspaceRepository,
    ZenHubIssue,
};
use crate::types::{EntityId, IssueNumber, PipelineId, ZenHubIssueId};

use super::client::ZenHubClient;
use super::error::ZenHubApiError;

const ISSUE_BY_INFO_QUERY: &str = r#"
query($repositoryGhId: Int!, $issueNumber: Int!) {
    issueByInfo(repositoryGhId: $repositoryGhId, issueNumber: $issueNumber) {
        id
        title
    }
}
"#;

const MOVE_ISSUE_MUTATION: &str = r#"
mutation($pipelineId: ID!, $issueId: ID!) {
    moveIssue(input: { pipelineId: $pipelineId, issueId: $issueId }) {
        pipeline { name }
    }
}
"#;

const SET_ESTIMATE_MUTATION: &str = r#"
mutation($issueId: ID!, $estimate: Float) {
    setEstimate(input: { issueId: $issueId, value: $estimate }) {
        issue { id }
    }
}
"#;

const PIPELINES_QUERY: &str = r#"
query($workspaceId: ID!) {
    workspace(id: $workspaceId) {
        pipelinesConnection {
            nodes { id name description }
        }
    }
}
"#;

const REPOSITORIES_QUERY: &str = r#"
query($workspaceId: ID!, $endCursor: String) {
    workspace(id: $workspaceId) {
        repositoriesConnection(after: $endCursor) {
            nodes { id name }
            pageInfo { hasNextPage endCursor }
        }
    }
}
"#;

const PIPELINE_ISSUES_QUERY: &str = r#"
query($pipelineId: ID!, $workspaceId: ID!, $endCursor: String, $filters: IssueSearchFiltersInput!) {
    searchIssuesByPipeline(
        pipelineId: $pipelineId
        filters: $filters
        after: $endCursor
        first: 100
        order: { field: created_at, direction: ASC }
    ) {
        nodes {
            id
            number
            ghNodeId
            metadata(workspaceId: $workspaceId)
            repository { id name }
        }
        pageInfo { hasNextPage endCursor }
    }
}
"#;

// ─── Raw Response Types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    nodes: Vec<T>,
    #[serde(default)]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl<T> Connection<T> {
    fn into_page<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        let next = self
            .page_info
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor);
        Page {
            nodes: self.nodes.into_iter().map(f).collect(),
            next,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueByInfoData {
    issue_by_info: Option<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceData<T> {
    workspace: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelinesConnection {
    pipelines_connection: Connection<RawPipeline>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoriesConnection {
    repositories_connection: Connection<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: String,
    name: String,
}

impl From<RawRepository> for WorkspaceRepository {
    fn from(raw: RawRepository) -> Self {
        WorkspaceRepository {
            id: raw.id,
            name: raw.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineIssuesData {
    search_issues_by_pipeline: Connection<RawPipelineIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPipelineIssue {
    id: String,
    number: u64,
    gh_node_id: String,
    #[serde(default)]
    metadata: RawIssueMetadata,
    repository: RawRepository,
}

/// The subset of ZenHub's untyped issue metadata blob that we read.
#[derive(Debug, Default, Deserialize)]
struct RawIssueMetadata {
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    estimate: Option<RawEstimate>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawEstimate {
    value: f64,
}

impl From<RawPipelineIssue> for PipelineIssue {
    fn from(raw: RawPipelineIssue) -> Self {
        PipelineIssue {
            id: ZenHubIssueId::new(raw.id),
            number: IssueNumber(raw.number),
            gh_node_id: EntityId::new(raw.gh_node_id),
            repository: raw.repository.into(),
            labels: raw.metadata.labels.into_iter().map(|l| l.name).collect(),
            estimate: raw.metadata.estimate.map(|e| e.value),
        }
    }
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl PipelineInterpreter for ZenHubClient {
    type Error = ZenHubApiError;

    async fn interpret(&self, effect: PipelineEffect) -> Result<PipelineResponse, Self::Error> {
        match effect {
            PipelineEffect::GetIssue {
                repository_gh_id,
                number,
            } => {
                let vars = json!({ "repositoryGhId": repository_gh_id, "issueNumber": number.0 });
                let data: IssueByInfoData = self.graphql(ISSUE_BY_INFO_QUERY, vars).await?;
                let issue = data.issue_by_info.ok_or_else(|| {
                    ZenHubApiError::permanent(format!(
                        "no ZenHub issue for repository {repository_gh_id} {number}"
                    ))
                })?;
                Ok(PipelineResponse::Issue(ZenHubIssue {
                    id: ZenHubIssueId::new(issue.id),
                    title: issue.title,
                }))
            }

            PipelineEffect::MoveIssue { issue, pipeline } => {
                let vars = json!({ "pipelineId": pipeline.as_str(), "issueId": issue.as_str() });
                let _: serde_json::Value = self.graphql(MOVE_ISSUE_MUTATION, vars).await?;
                Ok(PipelineResponse::Moved)
            }

            PipelineEffect::SetEstimate { issue, estimate } => {
                let value: Option<f64> = estimate.into();
                let vars = json!({ "issueId": issue.as_str(), "estimate": value });
                let _: serde_json::Value = self.graphql(SET_ESTIMATE_MUTATION, vars).await?;
                Ok(PipelineResponse::EstimateSet)
            }

            PipelineEffect::ListPipelines => {
                let vars = json!({ "workspaceId": self.workspace_id() });
                let data: WorkspaceData<PipelinesConnection> =
                    self.graphql(PIPELINES_QUERY, vars).await?;
                let pipelines = self
                    .workspace(data)?
                    .pipelines_connection
                    .nodes
                    .into_iter()
                    .map(|p| Pipeline {
                        id: PipelineId::new(p.id),
                        name: p.name,
                        description: p.description.unwrap_or_default(),
                    })
                    .collect();
                Ok(PipelineResponse::Pipelines(pipelines))
            }

            PipelineEffect::ListRepositories { after } => {
                let vars = json!({ "workspaceId": self.workspace_id(), "endCursor": after });
                let data: WorkspaceData<RepositoriesConnection> =
                    self.graphql(REPOSITORIES_QUERY, vars).await?;
                let page = self
                    .workspace(data)?
                    .repositories_connection
                    .into_page(WorkspaceRepository::from);
                Ok(PipelineResponse::Repositories(page))
            }

            PipelineEffect::SearchPipelineIssues {
                pipeline,
                repositories,
                after,
            } => {
                let vars = json!({
                    "pipelineId": pipeline.as_str(),
                    "workspaceId": self.workspace_id(),
                    "endCursor": after,
                    "filters": {
                        "matchType": "all",
                        "issueIssueTypeDisposition": "BOARD",
                        "repositoryIds": repositories,
                    },
                });
                let data: PipelineIssuesData = self.graphql(PIPELINE_ISSUES_QUERY, vars).await?;
                Ok(PipelineResponse::PipelineIssues(
                    data.search_issues_by_pipeline.into_page(PipelineIssue::from),
                ))
            }
        }
    }
}

impl ZenHubClient {
    fn workspace<T>(&self, data: WorkspaceData<T>) -> Result<T, ZenHubApiError> {
        data.workspace.ok_or_else(|| {
            ZenHubApiError::permanent(format!("workspace {} not found", self.workspace_id()))
        })
    }
}
