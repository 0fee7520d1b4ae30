//! Configuration authoring.
//!
//! Builds board entries from a live GitHub project so nobody has to copy
//! node ids by hand, and writes the resulting document back to disk. The
//! status and estimate fields are found by the names in
//! [`SyncConfig::field_names`].

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BoardConfig, ConfigError, FieldNames, LabelMapping, StatusOption, SyncConfig};
use crate::effects::{BoardEffect, BoardInterpreter, BoardResponse, PipelineInterpreter, ProjectFieldKind};
use crate::reconcile::error::BoxError;
use crate::reconcile::{ReconcileError, bootstrap_pipelines};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GitHub request failed: {0}")]
    GitHub(#[source] BoxError),

    #[error(transparent)]
    Pipelines(#[from] ReconcileError),

    #[error("unexpected GitHub response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("project {0} is closed")]
    ClosedProject(String),

    #[error("project {project} has no single-select field named {field:?}")]
    NoStatusField { project: String, field: String },

    #[error("project {project} has no number field named {field:?}")]
    NoEstimateField { project: String, field: String },

    #[error("a label mapping needs at least one label")]
    NoLabels,

    #[error("config {0} already exists")]
    AlreadyExists(PathBuf),
}

/// Reads project `number` and turns it into a board entry.
pub async fn board_from_project<G: BoardInterpreter>(
    github: &G,
    number: u64,
    names: &FieldNames,
) -> Result<BoardConfig, SetupError> {
    let project = match github
        .interpret(BoardEffect::GetProjectBoard { number })
        .await
        .map_err(|e| SetupError::GitHub(Box::new(e)))?
    {
        BoardResponse::ProjectBoard(project) => project,
        _ => return Err(SetupError::UnexpectedResponse("GetProjectBoard")),
    };

    if project.closed {
        return Err(SetupError::ClosedProject(project.title));
    }

    let status = project
        .field(&names.status)
        .and_then(|field| match &field.kind {
            ProjectFieldKind::SingleSelect { options } => Some((
                field.id.clone(),
                options
                    .iter()
                    .map(|o| StatusOption {
                        id: o.id.clone(),
                        name: o.name.clone(),
                    })
                    .collect::<Vec<_>>(),
            )),
            _ => None,
        });
    let Some((status_field_id, status_field_options)) = status else {
        return Err(SetupError::NoStatusField {
            project: project.title,
            field: names.status.clone(),
        });
    };

    let estimate = project
        .field(&names.estimate)
        .filter(|field| field.kind == ProjectFieldKind::Number)
        .map(|field| field.id.clone());
    let Some(estimate_field_id) = estimate else {
        return Err(SetupError::NoEstimateField {
            project: project.title,
            field: names.estimate.clone(),
        });
    };

    info!(project = %project.title, board = %project.id, "Read project fields");
    Ok(BoardConfig {
        github_board_id: project.id,
        status_field_id,
        status_field_options,
        estimate_field_id,
        source_of_truth: None,
        behavior_when_mismatch: None,
    })
}

/// Makes `board` the global board, returning the one it replaces.
pub fn set_global_board(config: &mut SyncConfig, board: BoardConfig) -> Option<BoardConfig> {
    let previous = config.global_board.replace(board);
    if let Some(previous) = &previous {
        warn!(board = %previous.github_board_id, "Replacing global board");
    }
    previous
}

/// Adds a mapping from `labels` to `board`. A mapping with the same label
/// set, in any order, is replaced in place. Returns true if one was
/// replaced.
pub fn upsert_label_mapping(
    config: &mut SyncConfig,
    labels: Vec<String>,
    board: BoardConfig,
) -> Result<bool, SetupError> {
    let mut unique: Vec<String> = Vec::new();
    for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if !unique.iter().any(|u| u == label) {
            unique.push(label.to_string());
        }
    }
    let labels = unique;
    if labels.is_empty() {
        return Err(SetupError::NoLabels);
    }

    let same_labels = |existing: &[String]| {
        existing.len() == labels.len() && existing.iter().all(|l| labels.contains(l))
    };

    match config
        .label_mappings
        .iter()
        .position(|m| same_labels(&m.labels))
    {
        Some(index) => {
            warn!(labels = ?labels, "Replacing existing label mapping");
            config.label_mappings[index] = LabelMapping { labels, board };
            Ok(true)
        }
        None => {
            config.label_mappings.push(LabelMapping { labels, board });
            Ok(false)
        }
    }
}

/// Writes a fresh document at `path` listing the workspace pipelines. An
/// existing document is never overwritten.
pub async fn init_config<Z: PipelineInterpreter>(
    path: &Path,
    zenhub: &Z,
) -> Result<SyncConfig, SetupError> {
    if path.exists() {
        return Err(SetupError::AlreadyExists(path.to_path_buf()));
    }

    let mut config = SyncConfig::default();
    bootstrap_pipelines(&mut config, zenhub).await?;
    config.save(path)?;
    Ok(config)
}
