//! The reconciliation engine.
//!
//! A [`Reconciler`] turns normalized webhook events into board and pipeline
//! writes. Every branch takes the `(entity, kind)` lock first; branches that
//! relay a value check the gap cache under that lock, record the new value,
//! and only then write.
//!
//! Writes to different boards run concurrently and are all awaited before
//! the lock is released. A failure on one board never stops the others.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::boards::{BoardTarget, configured_board_ids, resolve_boards};
use crate::cache::{KeyedGuard, KeyedMutex};
use crate::config::SyncConfig;
use crate::effects::{
    BoardEffect, BoardInterpreter, BoardItem, BoardResponse, EntityInfo, ItemState,
    PipelineEffect, PipelineInterpreter, PipelineResponse,
};
use crate::types::{
    BoardId, ChangeEvent, ChangeKind, ChangeValue, EntityId, Estimate, ItemId, ZenHubIssueId,
};
use crate::webhooks::{
    EntityAction, EntityEvent, FieldValue, GitHubEvent, ProjectFieldEvent, ZenHubEvent,
    ZenHubEventKind,
};

use super::error::ReconcileError;
use super::gap::EventGapCache;
use super::membership::{BoardExecutor, FieldUpdate};

/// Per-board results of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardReport {
    pub applied: Vec<BoardId>,
    /// Boards skipped because a status name had no matching option.
    pub skipped: Vec<BoardId>,
    pub failed: Vec<BoardId>,
}

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(BoardReport),
    /// An equivalent change was applied moments ago.
    Suppressed,
    Ignored(&'static str),
}

enum BoardJob {
    Place {
        target: BoardTarget,
        updates: Vec<FieldUpdate>,
    },
    Remove {
        board: BoardId,
        item: ItemId,
    },
}

impl BoardJob {
    fn board(&self) -> &BoardId {
        match self {
            BoardJob::Place { target, .. } => &target.board_id,
            BoardJob::Remove { board, .. } => board,
        }
    }
}

/// Where a relayed change should also be pushed in ZenHub.
enum Push {
    Pipeline(String),
    Estimate(Estimate),
}

pub struct Reconciler<G, Z> {
    config: Arc<SyncConfig>,
    executor: Arc<BoardExecutor<G>>,
    github: Arc<G>,
    zenhub: Arc<Z>,
    gaps: EventGapCache,
    locks: KeyedMutex<(EntityId, ChangeKind)>,
    workspace_id: String,
}

impl<G, Z> Reconciler<G, Z>
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
{
    pub fn new(
        config: Arc<SyncConfig>,
        github: Arc<G>,
        zenhub: Arc<Z>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self::with_gap_cache(config, github, zenhub, workspace_id, EventGapCache::default())
    }

    pub fn with_gap_cache(
        config: Arc<SyncConfig>,
        github: Arc<G>,
        zenhub: Arc<Z>,
        workspace_id: impl Into<String>,
        gaps: EventGapCache,
    ) -> Self {
        Self {
            config,
            executor: Arc::new(BoardExecutor::new(Arc::clone(&github))),
            github,
            zenhub,
            gaps,
            locks: KeyedMutex::new(),
            workspace_id: workspace_id.into(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn gaps(&self) -> &EventGapCache {
        &self.gaps
    }

    // ─── GitHub ───────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(repo = event.repository_name()))]
    pub async fn handle_github(&self, event: GitHubEvent) -> Result<Outcome, ReconcileError> {
        if let Some(repo) = event.repository_name()
            && !self.config.allows_repository(repo)
        {
            info!("Ignoring event from repository outside the allow-list");
            return Ok(Outcome::Ignored("repository not allowed"));
        }

        match event {
            GitHubEvent::Entity(e) => self.handle_entity(e).await,
            GitHubEvent::ProjectField(e) => self.handle_project_field(e).await,
        }
    }

    async fn handle_entity(&self, event: EntityEvent) -> Result<Outcome, ReconcileError> {
        let entity = self
            .entity(BoardEffect::GetEntityByNumber {
                repo: event.repo.name.clone(),
                number: event.number,
            })
            .await?;
        debug!(entity = %entity.id, number = %entity.number, labels = ?entity.labels, "Resolved entity");

        let targets = resolve_boards(&self.config, &entity.labels)?;

        match event.action {
            EntityAction::Opened | EntityAction::Reopened => self.opened(&entity, targets).await,
            EntityAction::Closed => self.closed(&entity, targets).await,
            EntityAction::Labeled => self.labeled(&entity, targets).await,
            EntityAction::Unlabeled => self.unlabeled(&entity, targets).await,
        }
    }

    /// New entities always land in the "new" status everywhere. The value is
    /// recorded unconditionally so the ZenHub echo of the pipeline move is
    /// dropped.
    async fn opened(
        &self,
        entity: &EntityInfo,
        targets: Vec<BoardTarget>,
    ) -> Result<Outcome, ReconcileError> {
        let status = self.config.statuses.new.clone();
        let event = ChangeEvent::status(entity.id.clone(), status.clone());

        let _guard = self.locks.lock((entity.id.clone(), ChangeKind::StatusUpdate)).await;
        self.gaps.record(&event);

        let report = self
            .run_jobs(&entity.id, place_all(targets, FieldUpdate::Status(status.clone())))
            .await;
        self.push(entity, Push::Pipeline(status)).await?;

        info!(entity = %entity.id, boards = ?report.applied, "Added entity to boards as new");
        Ok(Outcome::Applied(report))
    }

    /// ZenHub closes issues on its own, so nothing is pushed there.
    async fn closed(
        &self,
        entity: &EntityInfo,
        targets: Vec<BoardTarget>,
    ) -> Result<Outcome, ReconcileError> {
        let status = self.config.statuses.closed.clone();
        let event = ChangeEvent::status(entity.id.clone(), status.clone());

        let _guard = self.locks.lock((entity.id.clone(), ChangeKind::StatusUpdate)).await;
        self.gaps.record(&event);

        let report = self
            .run_jobs(&entity.id, place_all(targets, FieldUpdate::Status(status)))
            .await;

        info!(entity = %entity.id, boards = ?report.applied, "Marked entity closed on boards");
        Ok(Outcome::Applied(report))
    }

    /// Adds the entity to boards it newly qualifies for, copying status and
    /// estimate from its global board item.
    async fn labeled(
        &self,
        entity: &EntityInfo,
        targets: Vec<BoardTarget>,
    ) -> Result<Outcome, ReconcileError> {
        let _guards = self.lock_all_kinds(&entity.id).await;

        let existing = self.entity_boards(entity).await?;
        let state = match targets
            .first()
            .and_then(|global| existing.iter().find(|b| b.board == global.board_id))
        {
            Some(global) => self.item_state(&global.item).await?,
            None => ItemState::default(),
        };
        let status = state
            .status
            .unwrap_or_else(|| self.config.statuses.new.clone());

        let jobs: Vec<BoardJob> = targets
            .into_iter()
            .filter(|t| !existing.iter().any(|b| b.board == t.board_id))
            .map(|target| {
                let mut updates = Vec::new();
                if target.status_option(&status).is_some() {
                    updates.push(FieldUpdate::Status(status.clone()));
                } else {
                    warn!(board = %target.board_id, %status, "Status option not found on board");
                }
                if let Some(value) = state.estimate {
                    updates.push(FieldUpdate::Estimate(Estimate::Set(value)));
                }
                BoardJob::Place { target, updates }
            })
            .collect();

        if jobs.is_empty() {
            info!(entity = %entity.id, "Entity already on every board it qualifies for");
            return Ok(Outcome::Applied(BoardReport::default()));
        }

        // The copied values come back as board edits from the new boards.
        self.gaps
            .record(&ChangeEvent::status(entity.id.clone(), status.clone()));
        if let Some(value) = state.estimate {
            self.gaps.record(&ChangeEvent::estimate(
                entity.id.clone(),
                Estimate::Set(value),
            ));
        }

        let report = self.run_jobs(&entity.id, jobs).await;
        info!(entity = %entity.id, boards = ?report.applied, "Added entity to new boards");
        Ok(Outcome::Applied(report))
    }

    /// Removes the entity from configured boards it no longer qualifies for.
    /// Boards outside the configuration were added by hand and are kept.
    async fn unlabeled(
        &self,
        entity: &EntityInfo,
        targets: Vec<BoardTarget>,
    ) -> Result<Outcome, ReconcileError> {
        let _guards = self.lock_all_kinds(&entity.id).await;

        let configured = configured_board_ids(&self.config);
        let jobs: Vec<BoardJob> = self
            .entity_boards(entity)
            .await?
            .into_iter()
            .filter(|b| configured.contains(&b.board))
            .filter(|b| !targets.iter().any(|t| t.board_id == b.board))
            .map(|b| BoardJob::Remove {
                board: b.board,
                item: b.item,
            })
            .collect();

        if jobs.is_empty() {
            info!(entity = %entity.id, "Entity does not need to leave any board");
            return Ok(Outcome::Applied(BoardReport::default()));
        }

        let report = self.run_jobs(&entity.id, jobs).await;
        info!(entity = %entity.id, boards = ?report.applied, "Removed entity from boards");
        Ok(Outcome::Applied(report))
    }

    async fn handle_project_field(
        &self,
        event: ProjectFieldEvent,
    ) -> Result<Outcome, ReconcileError> {
        let names = &self.config.field_names;
        let (change, update, push) = match event.value {
            FieldValue::SingleSelect(name) if event.field_name == names.status => {
                // GitHub doesn't say what a cleared status was; treat it as new.
                let status = name.unwrap_or_else(|| self.config.statuses.new.clone());
                (
                    ChangeEvent::status(event.content.clone(), status.clone()),
                    FieldUpdate::Status(status.clone()),
                    Push::Pipeline(status),
                )
            }
            FieldValue::Number(estimate) if event.field_name == names.estimate => (
                ChangeEvent::estimate(event.content.clone(), estimate),
                FieldUpdate::Estimate(estimate),
                Push::Estimate(estimate),
            ),
            _ => {
                debug!(field = %event.field_name, "Ignoring edit of untracked field");
                return Ok(Outcome::Ignored("untracked field"));
            }
        };

        let entity = self
            .entity(BoardEffect::GetEntityByContentId {
                content: event.content.clone(),
            })
            .await?;
        let targets: Vec<BoardTarget> = resolve_boards(&self.config, &entity.labels)?
            .into_iter()
            .filter(|t| t.board_id != event.board)
            .collect();

        let origin = event.board;
        self.run_unless_echo(change, || async move {
            let report = self.run_jobs(&entity.id, place_all(targets, update)).await;
            self.push(&entity, push).await?;
            info!(entity = %entity.id, %origin, boards = ?report.applied, "Propagated board edit");
            Ok(Outcome::Applied(report))
        })
        .await
    }

    // ─── ZenHub ───────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(repo = %event.repo, number = %event.number, kind = event.kind.name()))]
    pub async fn handle_zenhub(&self, event: ZenHubEvent) -> Result<Outcome, ReconcileError> {
        let (value, update) = match event.kind {
            ZenHubEventKind::EstimateSet(value) => {
                (
                    ChangeValue::Estimate(Estimate::Set(value)),
                    FieldUpdate::Estimate(Estimate::Set(value)),
                )
            }
            ZenHubEventKind::EstimateCleared => (
                ChangeValue::Estimate(Estimate::Cleared),
                FieldUpdate::Estimate(Estimate::Cleared),
            ),
            ZenHubEventKind::IssueTransfer {
                workspace_id,
                to_pipeline,
            } => {
                if workspace_id != self.workspace_id {
                    info!(%workspace_id, "Skipping transfer in another workspace");
                    return Ok(Outcome::Ignored("foreign workspace"));
                }
                (
                    ChangeValue::Status(to_pipeline.clone()),
                    FieldUpdate::Status(to_pipeline),
                )
            }
            ZenHubEventKind::IssueReprioritized => {
                return Ok(Outcome::Ignored("reprioritization is not synchronized"));
            }
        };

        let entity = self
            .entity(BoardEffect::GetEntityByNumber {
                repo: event.repo.clone(),
                number: event.number,
            })
            .await?;
        let targets = resolve_boards(&self.config, &entity.labels)?;

        let change = ChangeEvent::new(entity.id.clone(), value);
        self.run_unless_echo(change, || async move {
            let report = self.run_jobs(&entity.id, place_all(targets, update)).await;
            info!(entity = %entity.id, boards = ?report.applied, "Applied ZenHub change to boards");
            Ok(Outcome::Applied(report))
        })
        .await
    }

    // ─── Shared Machinery ─────────────────────────────────────────────────────

    /// Places `entity` on every target with the same `updates`, outside any
    /// lock and without touching the gap cache.
    pub async fn place_on_boards(
        &self,
        entity: &EntityId,
        targets: Vec<BoardTarget>,
        updates: &[FieldUpdate],
    ) -> BoardReport {
        let jobs = targets
            .into_iter()
            .map(|target| BoardJob::Place {
                target,
                updates: updates.to_vec(),
            })
            .collect();
        self.run_jobs(entity, jobs).await
    }

    /// Holds every `(entity, kind)` lock, acquired in [`ChangeKind::ALL`]
    /// order.
    async fn lock_all_kinds(&self, entity: &EntityId) -> Vec<KeyedGuard<(EntityId, ChangeKind)>> {
        let mut guards = Vec::with_capacity(ChangeKind::ALL.len());
        for kind in ChangeKind::ALL {
            guards.push(self.locks.lock((entity.clone(), kind)).await);
        }
        guards
    }

    /// Takes the `(entity, kind)` lock, drops `event` if it echoes a recent
    /// change, records it, then runs `apply`.
    pub async fn run_unless_echo<F, Fut>(
        &self,
        event: ChangeEvent,
        apply: F,
    ) -> Result<Outcome, ReconcileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome, ReconcileError>>,
    {
        let _guard = self.locks.lock((event.entity.clone(), event.kind())).await;

        if self.gaps.is_equivalent_to_recent(&event) {
            debug!(entity = %event.entity, kind = %event.kind(), "Suppressed echo");
            return Ok(Outcome::Suppressed);
        }

        self.gaps.record(&event);
        apply().await
    }

    async fn run_jobs(&self, entity: &EntityId, jobs: Vec<BoardJob>) -> BoardReport {
        let mut set = JoinSet::new();
        for job in jobs {
            let executor = Arc::clone(&self.executor);
            let entity = entity.clone();
            set.spawn(async move {
                let board = job.board().clone();
                let result = match job {
                    BoardJob::Place { target, updates } => executor
                        .place(&entity, &target, &updates)
                        .await
                        .map(|_| ()),
                    BoardJob::Remove { board, item } => {
                        executor.remove_membership(&entity, &board, &item).await
                    }
                };
                (board, result)
            });
        }

        let mut report = BoardReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((board, Ok(()))) => report.applied.push(board),
                Ok((board, Err(e))) if e.is_lookup_miss() => {
                    warn!(entity = %entity, %board, error = %e, "Skipped board");
                    report.skipped.push(board);
                }
                Ok((board, Err(e))) => {
                    error!(entity = %entity, %board, error = %e, "Board update failed");
                    report.failed.push(board);
                }
                Err(e) => error!(entity = %entity, error = %e, "Board update task panicked"),
            }
        }

        report.applied.sort();
        report.skipped.sort();
        report.failed.sort();
        report
    }

    /// Mirrors a change into ZenHub. A status without a matching pipeline is
    /// a lookup miss and only logged.
    async fn push(&self, entity: &EntityInfo, push: Push) -> Result<(), ReconcileError> {
        let effect = match push {
            Push::Pipeline(name) => {
                let Some(pipeline) = self.config.pipeline_by_name(&name) else {
                    warn!(entity = %entity.id, pipeline = %name, "Pipeline not found");
                    return Ok(());
                };
                PipelineEffect::MoveIssue {
                    issue: self.zenhub_issue(entity).await?,
                    pipeline: pipeline.id.clone(),
                }
            }
            Push::Estimate(estimate) => PipelineEffect::SetEstimate {
                issue: self.zenhub_issue(entity).await?,
                estimate,
            },
        };

        match self.zenhub(effect).await? {
            PipelineResponse::Moved | PipelineResponse::EstimateSet => Ok(()),
            _ => Err(ReconcileError::UnexpectedResponse {
                system: "ZenHub",
                effect: "Push",
            }),
        }
    }

    // ─── Remote Helpers ───────────────────────────────────────────────────────

    async fn github(&self, effect: BoardEffect) -> Result<BoardResponse, ReconcileError> {
        self.github
            .interpret(effect)
            .await
            .map_err(|e| ReconcileError::GitHub(Box::new(e)))
    }

    async fn zenhub(&self, effect: PipelineEffect) -> Result<PipelineResponse, ReconcileError> {
        self.zenhub
            .interpret(effect)
            .await
            .map_err(|e| ReconcileError::ZenHub(Box::new(e)))
    }

    async fn entity(&self, effect: BoardEffect) -> Result<EntityInfo, ReconcileError> {
        match self.github(effect).await? {
            BoardResponse::Entity(entity) => Ok(entity),
            _ => Err(ReconcileError::UnexpectedResponse {
                system: "GitHub",
                effect: "GetEntity",
            }),
        }
    }

    async fn entity_boards(&self, entity: &EntityInfo) -> Result<Vec<BoardItem>, ReconcileError> {
        let effect = BoardEffect::ListEntityBoards {
            repo: entity.repository.name.clone(),
            number: entity.number,
        };
        match self.github(effect).await? {
            BoardResponse::Boards(boards) => Ok(boards),
            _ => Err(ReconcileError::UnexpectedResponse {
                system: "GitHub",
                effect: "ListEntityBoards",
            }),
        }
    }

    async fn item_state(&self, item: &ItemId) -> Result<ItemState, ReconcileError> {
        let effect = BoardEffect::GetItemState {
            item: item.clone(),
            status_field: self.config.field_names.status.clone(),
            estimate_field: self.config.field_names.estimate.clone(),
        };
        match self.github(effect).await? {
            BoardResponse::ItemState(state) => Ok(state),
            _ => Err(ReconcileError::UnexpectedResponse {
                system: "GitHub",
                effect: "GetItemState",
            }),
        }
    }

    async fn zenhub_issue(&self, entity: &EntityInfo) -> Result<ZenHubIssueId, ReconcileError> {
        let effect = PipelineEffect::GetIssue {
            repository_gh_id: entity.repository.database_id,
            number: entity.number,
        };
        match self.zenhub(effect).await? {
            PipelineResponse::Issue(issue) => Ok(issue.id),
            _ => Err(ReconcileError::UnexpectedResponse {
                system: "ZenHub",
                effect: "GetIssue",
            }),
        }
    }
}

fn place_all(targets: Vec<BoardTarget>, update: FieldUpdate) -> Vec<BoardJob> {
    targets
        .into_iter()
        .map(|target| BoardJob::Place {
            target,
            updates: vec![update.clone()],
        })
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
