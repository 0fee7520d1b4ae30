//! Shared test fixtures, recording mock interpreters and proptest strategies.

use std::collections::HashSet;
use std::sync::Mutex;

use proptest::prelude::*;
use thiserror::Error;

use crate::config::{BoardConfig, LabelMapping, Pipeline, StatusOption, SyncConfig};
use crate::effects::{
    BoardEffect, BoardInterpreter, BoardItem, BoardResponse, EntityInfo, FieldOption, ItemState,
    Page, PipelineEffect, PipelineInterpreter, PipelineIssue, PipelineResponse, ProjectBoard,
    ProjectField, ProjectFieldKind, WorkspaceRepository, ZenHubIssue,
};
use crate::types::{
    BoardId, EntityId, FieldId, IssueNumber, ItemId, PipelineId, RepoRef, ZenHubIssueId,
};

// ─── Fixtures ─────────────────────────────────────────────────────────────────

pub fn board(id: &str, statuses: &[&str]) -> BoardConfig {
    BoardConfig {
        github_board_id: BoardId::new(id),
        status_field_id: FieldId::new(format!("{id}_status")),
        status_field_options: statuses
            .iter()
            .map(|name| StatusOption {
                id: format!("{id}_{}", option_suffix(name)),
                name: name.to_string(),
            })
            .collect(),
        estimate_field_id: FieldId::new(format!("{id}_estimate")),
        source_of_truth: None,
        behavior_when_mismatch: None,
    }
}

fn option_suffix(name: &str) -> &str {
    match name {
        "New Issues" => "new",
        "In Progress" => "progress",
        "Closed" => "closed",
        other => other,
    }
}

pub fn pipeline(id: &str, name: &str) -> Pipeline {
    Pipeline {
        id: PipelineId::new(id),
        name: name.to_string(),
        description: String::new(),
    }
}

/// Global board `G` plus three mappings:
/// `B` for `team-x`, `Y` for `team-y`, and `P` for both. `P` has no
/// "In Progress" option.
pub fn sample_config() -> SyncConfig {
    let all = ["New Issues", "In Progress", "Closed"];
    SyncConfig {
        zenhub_pipelines: vec![
            pipeline("p-new", "New Issues"),
            pipeline("p-progress", "In Progress"),
            pipeline("p-closed", "Closed"),
        ],
        label_mappings: vec![
            LabelMapping {
                labels: vec!["team-x".into()],
                board: board("B", &all),
            },
            LabelMapping {
                labels: vec!["team-y".into()],
                board: board("Y", &all),
            },
            LabelMapping {
                labels: vec!["team-x".into(), "team-y".into()],
                board: board("P", &["New Issues", "Closed"]),
            },
        ],
        global_board: Some(board("G", &all)),
        ..SyncConfig::default()
    }
}

pub fn entity(id: &str, repo: &str, number: u64, labels: &[&str]) -> EntityInfo {
    EntityInfo {
        id: EntityId::new(id),
        number: IssueNumber(number),
        repository: RepoRef {
            name: repo.to_string(),
            database_id: 1000,
        },
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

/// A project with a `Status` single-select over `statuses`, an `Estimate`
/// number field and a `Title` field. Ids follow [`board`].
pub fn project(id: &str, statuses: &[&str]) -> ProjectBoard {
    ProjectBoard {
        id: BoardId::new(id),
        title: format!("Project {id}"),
        closed: false,
        fields: vec![
            ProjectField {
                id: FieldId::new(format!("{id}_title")),
                name: "Title".into(),
                kind: ProjectFieldKind::Other,
            },
            ProjectField {
                id: FieldId::new(format!("{id}_status")),
                name: "Status".into(),
                kind: ProjectFieldKind::SingleSelect {
                    options: statuses
                        .iter()
                        .map(|name| FieldOption {
                            id: format!("{id}_{}", option_suffix(name)),
                            name: name.to_string(),
                        })
                        .collect(),
                },
            },
            ProjectField {
                id: FieldId::new(format!("{id}_estimate")),
                name: "Estimate".into(),
                kind: ProjectFieldKind::Number,
            },
        ],
    }
}

pub fn item_id(board: &BoardId, content: &EntityId) -> ItemId {
    ItemId::new(format!("item-{board}-{content}"))
}

// ─── Mock Interpreters ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("mock failure: {0}")]
pub struct MockError(pub String);

/// Records every board effect and answers from scripted state.
///
/// `AddToBoard` returns a deterministic item id (see [`item_id`]).
#[derive(Default)]
pub struct MockBoards {
    entities: Vec<EntityInfo>,
    memberships: Vec<BoardItem>,
    item_state: ItemState,
    projects: Vec<(u64, ProjectBoard)>,
    failing: HashSet<BoardId>,
    effects: Mutex<Vec<BoardEffect>>,
}

impl MockBoards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityInfo) -> Self {
        self.entities.push(entity);
        self
    }

    /// Boards reported by `ListEntityBoards`.
    pub fn with_memberships(mut self, boards: &[&str], content: &str) -> Self {
        let content = EntityId::new(content);
        self.memberships = boards
            .iter()
            .map(|b| {
                let board = BoardId::new(*b);
                BoardItem {
                    item: item_id(&board, &content),
                    board,
                }
            })
            .collect();
        self
    }

    pub fn with_item_state(mut self, state: ItemState) -> Self {
        self.item_state = state;
        self
    }

    /// Project returned by `GetProjectBoard { number }`.
    pub fn with_project(mut self, number: u64, project: ProjectBoard) -> Self {
        self.projects.push((number, project));
        self
    }

    /// Every mutation against `board` fails.
    pub fn failing_on(mut self, board: &str) -> Self {
        self.failing.insert(BoardId::new(board));
        self
    }

    pub fn effects(&self) -> Vec<BoardEffect> {
        self.effects.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<BoardEffect> {
        self.effects()
            .into_iter()
            .filter(BoardEffect::is_mutation)
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&BoardEffect) -> bool) -> usize {
        self.effects().iter().filter(|e| predicate(e)).count()
    }

    /// Boards that received a write, deduplicated and sorted.
    pub fn written_boards(&self) -> Vec<BoardId> {
        let mut boards: Vec<BoardId> = self
            .mutations()
            .into_iter()
            .filter_map(|e| match e {
                BoardEffect::AddToBoard { board, .. }
                | BoardEffect::SetStatus { board, .. }
                | BoardEffect::SetEstimate { board, .. }
                | BoardEffect::ClearField { board, .. }
                | BoardEffect::RemoveItem { board, .. } => Some(board),
                _ => None,
            })
            .collect();
        boards.sort();
        boards.dedup();
        boards
    }

    fn fails(&self, board: &BoardId) -> Result<(), MockError> {
        if self.failing.contains(board) {
            Err(MockError(format!("board {board} unavailable")))
        } else {
            Ok(())
        }
    }
}

impl BoardInterpreter for MockBoards {
    type Error = MockError;

    async fn interpret(&self, effect: BoardEffect) -> Result<BoardResponse, Self::Error> {
        self.effects.lock().unwrap().push(effect.clone());

        match effect {
            BoardEffect::GetEntityByNumber { repo, number } => self
                .entities
                .iter()
                .find(|e| e.repository.name == repo && e.number == number)
                .cloned()
                .map(BoardResponse::Entity)
                .ok_or_else(|| MockError(format!("no entity {repo}{number}"))),
            BoardEffect::GetEntityByContentId { content } => self
                .entities
                .iter()
                .find(|e| e.id == content)
                .cloned()
                .map(BoardResponse::Entity)
                .ok_or_else(|| MockError(format!("no entity {content}"))),
            BoardEffect::ListEntityBoards { .. } => {
                Ok(BoardResponse::Boards(self.memberships.clone()))
            }
            BoardEffect::GetItemState { .. } => {
                Ok(BoardResponse::ItemState(self.item_state.clone()))
            }
            BoardEffect::GetProjectBoard { number } => self
                .projects
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, p)| BoardResponse::ProjectBoard(p.clone()))
                .ok_or_else(|| MockError(format!("no project #{number}"))),
            BoardEffect::AddToBoard { board, content } => {
                self.fails(&board)?;
                Ok(BoardResponse::ItemAdded(item_id(&board, &content)))
            }
            BoardEffect::SetStatus { board, .. }
            | BoardEffect::SetEstimate { board, .. }
            | BoardEffect::ClearField { board, .. } => {
                self.fails(&board)?;
                Ok(BoardResponse::FieldUpdated)
            }
            BoardEffect::RemoveItem { board, .. } => {
                self.fails(&board)?;
                Ok(BoardResponse::ItemRemoved)
            }
        }
    }
}

/// Records every pipeline effect and answers from scripted state.
///
/// `GetIssue` returns `zh-<number>`.
#[derive(Default)]
pub struct MockPipelines {
    pipelines: Vec<Pipeline>,
    repositories: Vec<Page<WorkspaceRepository>>,
    issues: Vec<(PipelineId, Vec<Page<PipelineIssue>>)>,
    effects: Mutex<Vec<PipelineEffect>>,
}

impl MockPipelines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipelines(mut self, pipelines: Vec<Pipeline>) -> Self {
        self.pipelines = pipelines;
        self
    }

    /// Repository pages, served in order. The cursor of page `n` is `"n"`.
    pub fn with_repositories(mut self, pages: Vec<Vec<WorkspaceRepository>>) -> Self {
        self.repositories = paginate(pages);
        self
    }

    pub fn with_pipeline_issues(mut self, pipeline: &str, pages: Vec<Vec<PipelineIssue>>) -> Self {
        self.issues.push((PipelineId::new(pipeline), paginate(pages)));
        self
    }

    pub fn effects(&self) -> Vec<PipelineEffect> {
        self.effects.lock().unwrap().clone()
    }

    pub fn moves(&self) -> Vec<(ZenHubIssueId, PipelineId)> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEffect::MoveIssue { issue, pipeline } => Some((issue, pipeline)),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.effects()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    PipelineEffect::MoveIssue { .. } | PipelineEffect::SetEstimate { .. }
                )
            })
            .count()
    }
}

fn paginate<T>(pages: Vec<Vec<T>>) -> Vec<Page<T>> {
    let last = pages.len().saturating_sub(1);
    pages
        .into_iter()
        .enumerate()
        .map(|(i, nodes)| Page {
            nodes,
            next: (i < last).then(|| (i + 1).to_string()),
        })
        .collect()
}

fn page_at<T: Clone>(pages: &[Page<T>], after: Option<&str>) -> Page<T> {
    let index = after.and_then(|a| a.parse::<usize>().ok()).unwrap_or(0);
    pages.get(index).cloned().unwrap_or(Page {
        nodes: Vec::new(),
        next: None,
    })
}

impl PipelineInterpreter for MockPipelines {
    type Error = MockError;

    async fn interpret(&self, effect: PipelineEffect) -> Result<PipelineResponse, Self::Error> {
        self.effects.lock().unwrap().push(effect.clone());

        Ok(match effect {
            PipelineEffect::GetIssue { number, .. } => PipelineResponse::Issue(ZenHubIssue {
                id: ZenHubIssueId::new(format!("zh-{}", number.0)),
                title: String::new(),
            }),
            PipelineEffect::MoveIssue { .. } => PipelineResponse::Moved,
            PipelineEffect::SetEstimate { .. } => PipelineResponse::EstimateSet,
            PipelineEffect::ListPipelines => PipelineResponse::Pipelines(self.pipelines.clone()),
            PipelineEffect::ListRepositories { after } => {
                PipelineResponse::Repositories(page_at(&self.repositories, after.as_deref()))
            }
            PipelineEffect::SearchPipelineIssues {
                pipeline, after, ..
            } => {
                let pages = self
                    .issues
                    .iter()
                    .find(|(id, _)| *id == pipeline)
                    .map(|(_, pages)| pages.as_slice())
                    .unwrap_or(&[]);
                PipelineResponse::PipelineIssues(page_at(pages, after.as_deref()))
            }
        })
    }
}

// ─── Strategies ───────────────────────────────────────────────────────────────

/// Any subset of the labels `sample_config` cares about, plus noise.
pub fn arb_labels() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(vec!["team-x", "team-y", "bug", "docs"], 0..=4)
        .prop_map(|labels| labels.into_iter().map(String::from).collect())
}

/// Configs whose mappings draw boards from a small pool that includes the
/// global board `G`, so duplicate targets are common.
pub fn arb_config() -> impl Strategy<Value = SyncConfig> {
    let mapping = (arb_labels(), prop::sample::select(vec!["G", "B", "Y", "P"])).prop_map(
        |(labels, id)| LabelMapping {
            labels,
            board: board(id, &["New Issues", "Closed"]),
        },
    );
    prop::collection::vec(mapping, 0..6).prop_map(|label_mappings| SyncConfig {
        label_mappings,
        global_board: Some(board("G", &["New Issues", "Closed"])),
        ..SyncConfig::default()
    })
}
