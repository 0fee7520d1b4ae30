//! Workspace-level ZenHub queries: pipelines, repositories and pipeline
//! contents, with cursor pagination folded away.

use std::future::Future;

use tracing::info;

use crate::config::{Pipeline, SyncConfig};
use crate::effects::{
    Page, PipelineEffect, PipelineInterpreter, PipelineIssue, PipelineResponse,
    WorkspaceRepository,
};
use crate::types::PipelineId;

use super::error::ReconcileError;

/// Follows `next` cursors until the last page, concatenating nodes.
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut nodes = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch(cursor.take()).await?;
        nodes.extend(page.nodes);
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(nodes),
        }
    }
}

async fn zenhub<Z: PipelineInterpreter>(
    zenhub: &Z,
    effect: PipelineEffect,
) -> Result<PipelineResponse, ReconcileError> {
    zenhub
        .interpret(effect)
        .await
        .map_err(|e| ReconcileError::ZenHub(Box::new(e)))
}

fn unexpected(effect: &'static str) -> ReconcileError {
    ReconcileError::UnexpectedResponse {
        system: "ZenHub",
        effect,
    }
}

pub async fn list_pipelines<Z: PipelineInterpreter>(
    client: &Z,
) -> Result<Vec<Pipeline>, ReconcileError> {
    match zenhub(client, PipelineEffect::ListPipelines).await? {
        PipelineResponse::Pipelines(pipelines) => Ok(pipelines),
        _ => Err(unexpected("ListPipelines")),
    }
}

pub async fn list_repositories<Z: PipelineInterpreter>(
    client: &Z,
) -> Result<Vec<WorkspaceRepository>, ReconcileError> {
    collect_pages(|after| async move {
        match zenhub(client, PipelineEffect::ListRepositories { after }).await? {
            PipelineResponse::Repositories(page) => Ok(page),
            _ => Err(unexpected("ListRepositories")),
        }
    })
    .await
}

/// Every issue in `pipeline` belonging to one of `repositories` (ZenHub
/// repository ids), oldest first.
pub async fn pipeline_issues<Z: PipelineInterpreter>(
    client: &Z,
    pipeline: &PipelineId,
    repositories: &[String],
) -> Result<Vec<PipelineIssue>, ReconcileError> {
    collect_pages(|after| async move {
        let effect = PipelineEffect::SearchPipelineIssues {
            pipeline: pipeline.clone(),
            repositories: repositories.to_vec(),
            after,
        };
        match zenhub(client, effect).await? {
            PipelineResponse::PipelineIssues(page) => Ok(page),
            _ => Err(unexpected("SearchPipelineIssues")),
        }
    })
    .await
}

/// Fills `config.zenhub_pipelines` from the workspace when the document
/// lists none.
pub async fn bootstrap_pipelines<Z: PipelineInterpreter>(
    config: &mut SyncConfig,
    client: &Z,
) -> Result<(), ReconcileError> {
    if !config.zenhub_pipelines.is_empty() {
        return Ok(());
    }

    let pipelines = list_pipelines(client).await?;
    info!(count = pipelines.len(), "Loaded pipelines from workspace");
    config.zenhub_pipelines = pipelines;
    Ok(())
}
