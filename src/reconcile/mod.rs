//! Event reconciliation.
//!
//! Normalized webhook events flow through here: boards are resolved from the
//! entity's labels, the `(entity, kind)` lock is taken, echoes are dropped by
//! the gap cache, and the executor writes the change to every target board
//! and, when GitHub originated it, to ZenHub.
//!
//! # Key Invariants
//!
//! 1. **Check then record under the lock**: the gap cache is only read and
//!    written while the `(entity, kind)` lock is held.
//! 2. **Lock order**: branches that need both kinds lock status before
//!    estimate.
//! 3. **Sibling isolation**: one board's failure is logged and reported, never
//!    propagated to the other boards of the same reconciliation.

pub mod engine;
pub mod error;
pub mod gap;
pub mod membership;
pub mod workspace;

pub use engine::{BoardReport, Outcome, Reconciler};
pub use error::{ExecutorError, ReconcileError};
pub use gap::{DEFAULT_GAP_CAPACITY, DEFAULT_GAP_TTL, EventGapCache, GapEntry};
pub use membership::{BoardExecutor, FieldUpdate};
pub use workspace::{
    bootstrap_pipelines, collect_pages, list_pipelines, list_repositories, pipeline_issues,
};
