//! Board effect interpreter using octocrab.
//!
//! Every operation is a single GraphQL query or mutation against the
//! Projects V2 API. Issues and pull requests are queried through the same
//! fragments, so callers never need to know which one they hold.

use serde::Deserialize;
use serde_json::json;

use crate::effects::{
    BoardEffect, BoardInterpreter, BoardItem, BoardResponse, EntityInfo, FieldOption, ItemState,
    ProjectBoard, ProjectField, ProjectFieldKind,
};
use crate::types::{BoardId, EntityId, FieldId, IssueNumber, ItemId, RepoRef};

use super::client::GitHubClient;
use super::error::GitHubApiError;

// ─── GraphQL Documents ────────────────────────────────────────────────────────

const ENTITY_FIELDS: &str = r#"
fragment EntityFields on Issue {
    id
    number
    labels(first: 100) { nodes { name } }
    repository { name databaseId }
}
fragment PullRequestFields on PullRequest {
    id
    number
    labels(first: 100) { nodes { name } }
    repository { name databaseId }
}
"#;

const ENTITY_BY_NUMBER_QUERY: &str = r#"
query($org: String!, $repo: String!, $number: Int!) {
    organization(login: $org) {
        repository(name: $repo) {
            issueOrPullRequest(number: $number) {
                ...EntityFields
                ...PullRequestFields
            }
        }
    }
}
"#;

const ENTITY_BY_ID_QUERY: &str = r#"
query($id: ID!) {
    node(id: $id) {
        ...EntityFields
        ...PullRequestFields
    }
}
"#;

const ENTITY_BOARDS_QUERY: &str = r#"
query($org: String!, $repo: String!, $number: Int!) {
    organization(login: $org) {
        repository(name: $repo) {
            issueOrPullRequest(number: $number) {
                ... on Issue { projectItems(first: 100) { nodes { id project { id } } } }
                ... on PullRequest { projectItems(first: 100) { nodes { id project { id } } } }
            }
        }
    }
}
"#;

const ITEM_STATE_QUERY: &str = r#"
query($item: ID!, $statusField: String!, $estimateField: String!) {
    node(id: $item) {
        ... on ProjectV2Item {
            status: fieldValueByName(name: $statusField) {
                ... on ProjectV2ItemFieldSingleSelectValue { name }
            }
            estimate: fieldValueByName(name: $estimateField) {
                ... on ProjectV2ItemFieldNumberValue { number }
            }
        }
    }
}
"#;

const PROJECT_BOARD_QUERY: &str = r#"
query($org: String!, $number: Int!) {
    organization(login: $org) {
        projectV2(number: $number) {
            id
            title
            closed
            fields(first: 100) {
                nodes {
                    ... on ProjectV2Field { id name dataType }
                    ... on ProjectV2IterationField { id name dataType }
                    ... on ProjectV2SingleSelectField { id name dataType options { id name } }
                }
            }
        }
    }
}
"#;

const ADD_ITEM_MUTATION: &str = r#"
mutation($project: ID!, $content: ID!) {
    addProjectV2ItemById(input: { projectId: $project, contentId: $content }) {
        item { id }
    }
}
"#;

const SET_SINGLE_SELECT_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
    updateProjectV2ItemFieldValue(input: {
        projectId: $project, itemId: $item, fieldId: $field,
        value: { singleSelectOptionId: $option }
    }) { projectV2Item { id } }
}
"#;

const SET_NUMBER_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!, $value: Float!) {
    updateProjectV2ItemFieldValue(input: {
        projectId: $project, itemId: $item, fieldId: $field,
        value: { number: $value }
    }) { projectV2Item { id } }
}
"#;

const CLEAR_FIELD_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!) {
    clearProjectV2ItemFieldValue(input: { projectId: $project, itemId: $item, fieldId: $field }) {
        projectV2Item { id }
    }
}
"#;

const DELETE_ITEM_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!) {
    deleteProjectV2Item(input: { projectId: $project, itemId: $item }) {
        deletedItemId
    }
}
"#;

// ─── GraphQL Types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OrganizationData<T> {
    organization: Option<RepositoryData<T>>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<IssueOrPullRequest<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueOrPullRequest<T> {
    issue_or_pull_request: Option<T>,
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

/// Fields shared by issues and pull requests. Empty when the node is
/// something else.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    id: Option<String>,
    number: Option<u64>,
    labels: Option<Nodes<RawLabel>>,
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    name: String,
    database_id: u64,
}

impl RawEntity {
    fn into_entity(self, what: &str) -> Result<EntityInfo, GitHubApiError> {
        let (Some(id), Some(number), Some(repository)) = (self.id, self.number, self.repository)
        else {
            return Err(GitHubApiError::permanent(format!(
                "{what} is not an issue or pull request"
            )));
        };

        Ok(EntityInfo {
            id: EntityId::new(id),
            number: IssueNumber(number),
            repository: RepoRef {
                name: repository.name,
                database_id: repository.database_id,
            },
            labels: self
                .labels
                .map(|l| l.nodes.into_iter().map(|n| n.name).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjectItems {
    project_items: Option<Nodes<RawProjectItem>>,
}

#[derive(Debug, Deserialize)]
struct RawProjectItem {
    id: String,
    project: RawProject,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawItemState {
    status: Option<RawStatusValue>,
    estimate: Option<RawEstimateValue>,
}

#[derive(Debug, Deserialize)]
struct RawStatusValue {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEstimateValue {
    number: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectData {
    organization: Option<RawOrganizationProject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrganizationProject {
    project_v2: Option<RawProjectBoard>,
}

#[derive(Debug, Deserialize)]
struct RawProjectBoard {
    id: String,
    title: String,
    closed: bool,
    fields: Nodes<RawField>,
}

/// Empty for field types none of the fragments select.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    id: Option<String>,
    name: Option<String>,
    data_type: Option<String>,
    options: Option<Vec<RawOption>>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    id: String,
    name: String,
}

impl RawProjectBoard {
    fn into_board(self) -> ProjectBoard {
        let fields = self
            .fields
            .nodes
            .into_iter()
            .filter_map(|raw| {
                let (Some(id), Some(name)) = (raw.id, raw.name) else {
                    return None;
                };
                let kind = match (raw.options, raw.data_type.as_deref()) {
                    (Some(options), _) => ProjectFieldKind::SingleSelect {
                        options: options
                            .into_iter()
                            .map(|o| FieldOption {
                                id: o.id,
                                name: o.name,
                            })
                            .collect(),
                    },
                    (None, Some("NUMBER")) => ProjectFieldKind::Number,
                    _ => ProjectFieldKind::Other,
                };
                Some(ProjectField {
                    id: FieldId::new(id),
                    name,
                    kind,
                })
            })
            .collect();

        ProjectBoard {
            id: BoardId::new(self.id),
            title: self.title,
            closed: self.closed,
            fields,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemData {
    add_project_v2_item_by_id: Option<AddedItem>,
}

#[derive(Debug, Deserialize)]
struct AddedItem {
    item: Option<RawItemId>,
}

#[derive(Debug, Deserialize)]
struct RawItemId {
    id: String,
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl BoardInterpreter for GitHubClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: BoardEffect) -> Result<BoardResponse, Self::Error> {
        match effect {
            BoardEffect::GetEntityByNumber { repo, number } => {
                entity_by_number(self, &repo, number).await
            }
            BoardEffect::GetEntityByContentId { content } => entity_by_id(self, &content).await,
            BoardEffect::ListEntityBoards { repo, number } => {
                entity_boards(self, &repo, number).await
            }
            BoardEffect::GetItemState {
                item,
                status_field,
                estimate_field,
            } => item_state(self, &item, &status_field, &estimate_field).await,
            BoardEffect::GetProjectBoard { number } => project_board(self, number).await,
            BoardEffect::AddToBoard { board, content } => add_item(self, &board, &content).await,
            BoardEffect::SetStatus {
                board,
                item,
                field,
                option_id,
            } => {
                let vars = field_vars(&board, &item, &field, "option", json!(option_id));
                mutate(self, SET_SINGLE_SELECT_MUTATION, vars).await
            }
            BoardEffect::SetEstimate {
                board,
                item,
                field,
                value,
            } => {
                let vars = field_vars(&board, &item, &field, "value", json!(value));
                mutate(self, SET_NUMBER_MUTATION, vars).await
            }
            BoardEffect::ClearField { board, item, field } => {
                let vars = json!({
                    "project": board.as_str(),
                    "item": item.as_str(),
                    "field": field.as_str(),
                });
                mutate(self, CLEAR_FIELD_MUTATION, vars).await
            }
            BoardEffect::RemoveItem { board, item } => {
                let vars = json!({ "project": board.as_str(), "item": item.as_str() });
                let _: serde_json::Value = self.graphql(DELETE_ITEM_MUTATION, vars).await?;
                Ok(BoardResponse::ItemRemoved)
            }
        }
    }
}

fn field_vars(
    board: &BoardId,
    item: &ItemId,
    field: &FieldId,
    value_name: &str,
    value: serde_json::Value,
) -> serde_json::Value {
    let mut vars = json!({
        "project": board.as_str(),
        "item": item.as_str(),
        "field": field.as_str(),
    });
    vars[value_name] = value;
    vars
}

async fn mutate(
    client: &GitHubClient,
    mutation: &str,
    variables: serde_json::Value,
) -> Result<BoardResponse, GitHubApiError> {
    let _: serde_json::Value = client.graphql(mutation, variables).await?;
    Ok(BoardResponse::FieldUpdated)
}

fn repo_vars(client: &GitHubClient, repo: &str, number: IssueNumber) -> serde_json::Value {
    json!({
        "org": client.organization(),
        "repo": repo,
        "number": number.0,
    })
}

async fn entity_by_number(
    client: &GitHubClient,
    repo: &str,
    number: IssueNumber,
) -> Result<BoardResponse, GitHubApiError> {
    let query = format!("{ENTITY_BY_NUMBER_QUERY}{ENTITY_FIELDS}");
    let data: OrganizationData<RawEntity> =
        client.graphql(&query, repo_vars(client, repo, number)).await?;

    let raw = data
        .organization
        .and_then(|o| o.repository)
        .and_then(|r| r.issue_or_pull_request)
        .ok_or_else(|| GitHubApiError::permanent(format!("{repo}{number} not found")))?;

    raw.into_entity(&format!("{repo}{number}"))
        .map(BoardResponse::Entity)
}

async fn entity_by_id(
    client: &GitHubClient,
    content: &EntityId,
) -> Result<BoardResponse, GitHubApiError> {
    let query = format!("{ENTITY_BY_ID_QUERY}{ENTITY_FIELDS}");
    let data: NodeData<RawEntity> =
        client.graphql(&query, json!({ "id": content.as_str() })).await?;

    let raw = data
        .node
        .ok_or_else(|| GitHubApiError::permanent(format!("node {content} not found")))?;

    raw.into_entity(content.as_str()).map(BoardResponse::Entity)
}

async fn entity_boards(
    client: &GitHubClient,
    repo: &str,
    number: IssueNumber,
) -> Result<BoardResponse, GitHubApiError> {
    let data: OrganizationData<RawProjectItems> =
        client.graphql(ENTITY_BOARDS_QUERY, repo_vars(client, repo, number)).await?;

    let items = data
        .organization
        .and_then(|o| o.repository)
        .and_then(|r| r.issue_or_pull_request)
        .ok_or_else(|| GitHubApiError::permanent(format!("{repo}{number} not found")))?
        .project_items
        .map(|p| p.nodes)
        .unwrap_or_default();

    Ok(BoardResponse::Boards(
        items
            .into_iter()
            .map(|i| BoardItem {
                board: BoardId::new(i.project.id),
                item: ItemId::new(i.id),
            })
            .collect(),
    ))
}

async fn item_state(
    client: &GitHubClient,
    item: &ItemId,
    status_field: &str,
    estimate_field: &str,
) -> Result<BoardResponse, GitHubApiError> {
    let vars = json!({
        "item": item.as_str(),
        "statusField": status_field,
        "estimateField": estimate_field,
    });
    let data: NodeData<RawItemState> = client.graphql(ITEM_STATE_QUERY, vars).await?;

    let raw = data
        .node
        .ok_or_else(|| GitHubApiError::permanent(format!("item {item} not found")))?;

    Ok(BoardResponse::ItemState(ItemState {
        status: raw.status.and_then(|s| s.name),
        estimate: raw.estimate.and_then(|e| e.number),
    }))
}

async fn project_board(client: &GitHubClient, number: u64) -> Result<BoardResponse, GitHubApiError> {
    let vars = json!({ "org": client.organization(), "number": number });
    let data: ProjectData = client.graphql(PROJECT_BOARD_QUERY, vars).await?;

    let raw = data
        .organization
        .and_then(|o| o.project_v2)
        .ok_or_else(|| GitHubApiError::permanent(format!("project #{number} not found")))?;

    Ok(BoardResponse::ProjectBoard(raw.into_board()))
}

async fn add_item(
    client: &GitHubClient,
    board: &BoardId,
    content: &EntityId,
) -> Result<BoardResponse, GitHubApiError> {
    let vars = json!({ "project": board.as_str(), "content": content.as_str() });
    let data: AddItemData = client.graphql(ADD_ITEM_MUTATION, vars).await?;

    let item = data
        .add_project_v2_item_by_id
        .and_then(|a| a.item)
        .ok_or_else(|| {
            GitHubApiError::permanent(format!("adding {content} to {board} returned no item"))
        })?;

    Ok(BoardResponse::ItemAdded(ItemId::new(item.id)))
}
