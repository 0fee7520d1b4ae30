//! Error types for reconciliation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::BoardId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure applying a change to one board.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The board has no status option with the requested name. Not retried.
    #[error("status option {status:?} not found on board {board}")]
    UnknownStatusOption { board: BoardId, status: String },

    #[error("GitHub request failed: {0}")]
    Remote(#[source] BoxError),

    #[error("unexpected GitHub response to {effect}")]
    UnexpectedResponse { effect: &'static str },
}

impl ExecutorError {
    /// Lookup misses are expected configuration drift and are logged as
    /// warnings rather than errors.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, ExecutorError::UnknownStatusOption { .. })
    }
}

/// Failure of a whole reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GitHub request failed: {0}")]
    GitHub(#[source] BoxError),

    #[error("ZenHub request failed: {0}")]
    ZenHub(#[source] BoxError),

    #[error("unexpected {system} response to {effect}")]
    UnexpectedResponse {
        system: &'static str,
        effect: &'static str,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
