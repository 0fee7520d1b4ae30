//! Effect interpreter traits.
//!
//! The reconciliation engine only ever talks to the two remote systems
//! through these traits. Production implementations live in `crate::github`
//! (octocrab) and `crate::zenhub` (reqwest); tests use recording mocks from
//! `crate::test_utils`.

use std::future::Future;

use super::board::{BoardEffect, BoardResponse};
use super::pipeline::{PipelineEffect, PipelineResponse};

/// Interprets board effects against GitHub.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct FixedItem;
///
/// impl BoardInterpreter for FixedItem {
///     type Error = std::io::Error;
///
///     async fn interpret(&self, effect: BoardEffect) -> Result<BoardResponse, Self::Error> {
///         match effect {
///             BoardEffect::AddToBoard { .. } => Ok(BoardResponse::ItemAdded(ItemId::new("PVTI_1"))),
///             _ => Ok(BoardResponse::FieldUpdated),
///         }
///     }
/// }
/// ```
pub trait BoardInterpreter: Send + Sync + 'static {
    /// The error type returned by this interpreter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute a board effect and return its response.
    fn interpret(
        &self,
        effect: BoardEffect,
    ) -> impl Future<Output = Result<BoardResponse, Self::Error>> + Send;
}

/// Interprets pipeline effects against ZenHub.
///
/// Implementations are constructed for one workspace, so all effects executed
/// through a single interpreter operate on that workspace.
pub trait PipelineInterpreter: Send + Sync + 'static {
    /// The error type returned by this interpreter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute a pipeline effect and return its response.
    fn interpret(
        &self,
        effect: PipelineEffect,
    ) -> impl Future<Output = Result<PipelineResponse, Self::Error>> + Send;
}
