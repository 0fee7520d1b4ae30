//! One-shot import of ZenHub state onto the GitHub boards.
//!
//! For every configured pipeline, every issue of an allowed repository is
//! placed on the boards its labels resolve to, with the pipeline as its
//! status and the ZenHub estimate as its estimate. Whatever the boards held
//! before is overwritten.
//!
//! The import runs beside a live server. Each write would come back to that
//! server as a board webhook and be relayed to ZenHub, so the value is first
//! posted to the server's loopback endpoint, which makes the echo a no-op.
//!
//! Progress is rewritten to a JSON results file after every issue. An
//! interrupted run can be compared against a rerun.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::boards::resolve_boards;
use crate::config::{ConfigError, Pipeline};
use crate::effects::{BoardInterpreter, PipelineInterpreter, PipelineIssue};
use crate::reconcile::{
    FieldUpdate, GapEntry, ReconcileError, Reconciler, list_repositories, pipeline_issues,
};
use crate::server::INTERNAL_USER_AGENT;
use crate::types::{ChangeEvent, Estimate};

/// File the import writes its progress to, relative to the working directory.
pub const DEFAULT_RESULTS_PATH: &str = "import-results.json";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("failed to notify the running server: {0}")]
    Notify(#[from] reqwest::Error),

    #[error("failed to write results to {path}: {source}")]
    Results {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What has been processed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResults {
    /// Names of fully processed pipelines.
    pub pipelines: Vec<String>,
    /// `repo/number` of every processed issue, including failed ones.
    pub issues: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Read ZenHub and log the placements without writing anything to
    /// GitHub or the loopback endpoint.
    pub dry_run: bool,
    pub results_path: PathBuf,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
        }
    }
}

/// Tells the running server about a change before it is applied.
pub trait GapNotifier: Send + Sync {
    fn notify(&self, entry: &GapEntry) -> impl Future<Output = Result<(), ImportError>> + Send;
}

/// Posts gap entries to `/internal/event-cache` on a running server.
#[derive(Debug, Clone)]
pub struct LoopbackNotifier {
    http: reqwest::Client,
    url: String,
}

impl LoopbackNotifier {
    pub fn new(base_url: &str) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(INTERNAL_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            url: format!("{}/internal/event-cache", base_url.trim_end_matches('/')),
        })
    }
}

impl GapNotifier for LoopbackNotifier {
    async fn notify(&self, entry: &GapEntry) -> Result<(), ImportError> {
        self.http
            .post(&self.url)
            .json(entry)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub struct Importer<G, Z, N> {
    reconciler: Arc<Reconciler<G, Z>>,
    zenhub: Arc<Z>,
    notifier: N,
    options: ImportOptions,
}

impl<G, Z, N> Importer<G, Z, N>
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
    N: GapNotifier,
{
    pub fn new(
        reconciler: Arc<Reconciler<G, Z>>,
        zenhub: Arc<Z>,
        notifier: N,
        options: ImportOptions,
    ) -> Self {
        Self {
            reconciler,
            zenhub,
            notifier,
            options,
        }
    }

    /// Runs the import to completion. Only workspace-level failures (no
    /// global board, unreadable repository or pipeline listings, an
    /// unwritable results file) abort it; a failing issue is logged and
    /// skipped.
    pub async fn run(&self) -> Result<ImportResults, ImportError> {
        let config = self.reconciler.config();
        if config.global_board.is_none() {
            return Err(ReconcileError::Config(ConfigError::NoGlobalBoard).into());
        }

        let repositories: Vec<String> = list_repositories(self.zenhub.as_ref())
            .await?
            .into_iter()
            .filter(|r| config.allows_repository(&r.name))
            .map(|r| r.id)
            .collect();
        info!(
            repositories = repositories.len(),
            dry_run = self.options.dry_run,
            "Starting import"
        );

        let mut results = ImportResults::default();
        for pipeline in &config.zenhub_pipelines {
            info!(pipeline = %pipeline.name, id = %pipeline.id, "Syncing pipeline");

            let issues = pipeline_issues(self.zenhub.as_ref(), &pipeline.id, &repositories).await?;
            for issue in issues {
                let label = format!("{}/{}", issue.repository.name, issue.number.0);
                if let Err(e) = self.import_issue(&issue, pipeline).await {
                    error!(issue = %label, error = %e, "Failed to import issue");
                }

                results.issues.push(label);
                write_results(&self.options.results_path, &results).await?;
            }

            results.pipelines.push(pipeline.name.clone());
            write_results(&self.options.results_path, &results).await?;
            info!(pipeline = %pipeline.name, "Done syncing pipeline");
        }

        Ok(results)
    }

    #[instrument(skip_all, fields(repo = %issue.repository.name, number = issue.number.0))]
    async fn import_issue(&self, issue: &PipelineIssue, pipeline: &Pipeline) -> Result<(), ImportError> {
        let targets =
            resolve_boards(self.reconciler.config(), &issue.labels).map_err(ReconcileError::from)?;

        if self.options.dry_run {
            let boards: Vec<_> = targets.iter().map(|t| t.board_id.as_str()).collect();
            info!(?boards, status = %pipeline.name, estimate = ?issue.estimate, "Would place issue");
            return Ok(());
        }

        let entity = &issue.gh_node_id;
        let mut updates = vec![FieldUpdate::Status(pipeline.name.clone())];
        let mut changes = vec![ChangeEvent::status(entity.clone(), pipeline.name.clone())];
        if let Some(value) = issue.estimate {
            updates.push(FieldUpdate::Estimate(Estimate::Set(value)));
            changes.push(ChangeEvent::estimate(entity.clone(), Estimate::Set(value)));
        }

        for change in &changes {
            self.notifier.notify(&GapEntry::from_event(change)).await?;
        }

        let report = self
            .reconciler
            .place_on_boards(entity, targets, &updates)
            .await;
        if !report.failed.is_empty() || !report.skipped.is_empty() {
            warn!(failed = ?report.failed, skipped = ?report.skipped, "Issue only partly placed");
        }
        info!(boards = ?report.applied, "Placed issue");
        Ok(())
    }
}

async fn write_results(path: &Path, results: &ImportResults) -> Result<(), ImportError> {
    let json = serde_json::to_vec_pretty(results)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| ImportError::Results {
            path: path.to_path_buf(),
            source,
        })
}
