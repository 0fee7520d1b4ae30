//! Webhook payload parsers.
//!
//! # Parsing Strategy
//!
//! 1. GitHub: the event type comes from the `X-GitHub-Event` header. Event
//!    types and actions that don't affect boards return `Ok(None)`.
//! 2. ZenHub: the event type is the `type` field of the body, which is either
//!    JSON or form encoded. Unknown types are errors, since ZenHub only sends
//!    the four documented ones.
//! 3. Malformed payloads return `Err` with details.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::types::{BoardId, EntityId, Estimate, IssueNumber, RepoRef};

use super::events::{
    EntityAction, EntityEvent, FieldValue, GitHubEvent, ProjectFieldEvent, ZenHubEvent,
    ZenHubEventKind,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("form parse error: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("unhandled ZenHub webhook type {0:?}")]
    UnknownType(String),
}

/// Parses a GitHub delivery.
///
/// ```
/// use board_sync::webhooks::{parse_github_webhook, EntityAction, GitHubEvent};
///
/// let payload = br#"{
///     "action": "labeled",
///     "issue": { "number": 7, "node_id": "I_7" },
///     "repository": { "id": 99, "name": "web" }
/// }"#;
///
/// match parse_github_webhook("issues", payload).unwrap() {
///     Some(GitHubEvent::Entity(e)) => assert_eq!(e.action, EntityAction::Labeled),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn parse_github_webhook(
    event_type: &str,
    payload: &[u8],
) -> Result<Option<GitHubEvent>, ParseError> {
    match event_type {
        "issues" => {
            let raw: RawIssuesPayload = serde_json::from_slice(payload)?;
            Ok(entity_event(&raw.action, raw.issue, raw.repository, ISSUE_IGNORED))
        }
        "pull_request" => {
            let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
            Ok(entity_event(
                &raw.action,
                raw.pull_request,
                raw.repository,
                PULL_REQUEST_IGNORED,
            ))
        }
        "projects_v2_item" => parse_project_item(payload),
        _ => Ok(None),
    }
}

/// Parses a JSON ZenHub delivery.
pub fn parse_zenhub_json(payload: &[u8]) -> Result<ZenHubEvent, ParseError> {
    let raw: RawZenHubPayload = serde_json::from_slice(payload)?;
    raw.try_into()
}

/// Parses an `application/x-www-form-urlencoded` ZenHub delivery.
pub fn parse_zenhub_form(payload: &[u8]) -> Result<ZenHubEvent, ParseError> {
    let raw: RawZenHubPayload = serde_urlencoded::from_bytes(payload)?;
    raw.try_into()
}

// ============================================================================
// issues / pull_request
// ============================================================================

const ISSUE_IGNORED: &[&str] = &[
    "assigned",
    "unassigned",
    "deleted",
    "milestoned",
    "demilestoned",
    "edited",
    "locked",
    "unlocked",
    "pinned",
    "unpinned",
    "transferred",
    "typed",
    "untyped",
];

const PULL_REQUEST_IGNORED: &[&str] = &[
    "assigned",
    "unassigned",
    "milestoned",
    "demilestoned",
    "edited",
    "locked",
    "unlocked",
    "auto_merge_enabled",
    "auto_merge_disabled",
    "converted_to_draft",
    "ready_for_review",
    "enqueued",
    "dequeued",
    "review_requested",
    "review_request_removed",
    "synchronize",
];

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawEntity,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawEntity,
    repository: RawRepository,
}

fn entity_event(
    action: &str,
    entity: RawEntity,
    repository: RawRepository,
    ignored: &[&str],
) -> Option<GitHubEvent> {
    let action = match action {
        "opened" => EntityAction::Opened,
        "reopened" => EntityAction::Reopened,
        "closed" => EntityAction::Closed,
        "labeled" => EntityAction::Labeled,
        "unlabeled" => EntityAction::Unlabeled,
        other => {
            if !ignored.contains(&other) {
                warn!(action = other, repo = %repository.name, "Unhandled entity action");
            }
            return None;
        }
    };

    Some(GitHubEvent::Entity(EntityEvent {
        repo: RepoRef {
            name: repository.name,
            database_id: repository.id,
        },
        number: IssueNumber(entity.number),
        action,
    }))
}

// ============================================================================
// projects_v2_item
// ============================================================================

const PROJECT_ITEM_IGNORED: &[&str] = &[
    "created",
    "deleted",
    "archived",
    "restored",
    "converted",
    "reordered",
];

#[derive(Debug, Deserialize)]
struct RawProjectItemPayload {
    action: String,
    projects_v2_item: RawProjectItem,
    changes: Option<RawChanges>,
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawProjectItem {
    project_node_id: String,
    content_node_id: String,
}

#[derive(Debug, Deserialize)]
struct RawChanges {
    field_value: Option<RawFieldValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "field_type", rename_all = "snake_case")]
enum RawFieldValue {
    Number {
        field_name: String,
        // Absent when the field was cleared.
        #[serde(default)]
        to: Option<f64>,
    },
    SingleSelect {
        field_name: String,
        #[serde(default)]
        to: Option<RawOption>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    name: String,
}

fn parse_project_item(payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    let raw: RawProjectItemPayload = serde_json::from_slice(payload)?;

    if raw.action != "edited" {
        if !PROJECT_ITEM_IGNORED.contains(&raw.action.as_str()) {
            warn!(action = %raw.action, "Unhandled project item action");
        }
        return Ok(None);
    }

    let field = raw
        .changes
        .and_then(|c| c.field_value)
        .ok_or(ParseError::MissingField("changes.field_value"))?;

    let (field_name, value) = match field {
        RawFieldValue::Number { field_name, to } => {
            (field_name, FieldValue::Number(Estimate::from(to)))
        }
        RawFieldValue::SingleSelect { field_name, to } => {
            (field_name, FieldValue::SingleSelect(to.map(|o| o.name)))
        }
        RawFieldValue::Other => return Ok(None),
    };

    Ok(Some(GitHubEvent::ProjectField(ProjectFieldEvent {
        board: BoardId::new(raw.projects_v2_item.project_node_id),
        content: EntityId::new(raw.projects_v2_item.content_node_id),
        repository: raw.repository.map(|r| r.name),
        field_name,
        value,
    })))
}

// ============================================================================
// ZenHub
// ============================================================================

/// ZenHub sends every value as a string, in both encodings.
#[derive(Debug, Deserialize)]
struct RawZenHubPayload {
    #[serde(rename = "type")]
    kind: String,
    organization: String,
    repo: String,
    issue_number: String,
    estimate: Option<String>,
    workspace_id: Option<String>,
    to_pipeline_name: Option<String>,
}

impl TryFrom<RawZenHubPayload> for ZenHubEvent {
    type Error = ParseError;

    fn try_from(raw: RawZenHubPayload) -> Result<Self, Self::Error> {
        let number = raw
            .issue_number
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidField {
                field: "issue_number",
                value: raw.issue_number.clone(),
            })?;

        let kind = match raw.kind.as_str() {
            "estimate_set" => {
                let text = raw.estimate.ok_or(ParseError::MissingField("estimate"))?;
                let value = text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or(ParseError::InvalidField {
                        field: "estimate",
                        value: text,
                    })?;
                ZenHubEventKind::EstimateSet(value)
            }
            "estimate_cleared" => ZenHubEventKind::EstimateCleared,
            "issue_transfer" => ZenHubEventKind::IssueTransfer {
                workspace_id: raw
                    .workspace_id
                    .ok_or(ParseError::MissingField("workspace_id"))?,
                to_pipeline: raw
                    .to_pipeline_name
                    .ok_or(ParseError::MissingField("to_pipeline_name"))?,
            },
            "issue_reprioritized" => ZenHubEventKind::IssueReprioritized,
            _ => return Err(ParseError::UnknownType(raw.kind)),
        };

        Ok(ZenHubEvent {
            organization: raw.organization,
            repo: raw.repo,
            number: IssueNumber(number),
            kind,
        })
    }
}
