//! Effects-as-data for GitHub and ZenHub operations.
//!
//! This module defines effect types that describe remote operations without
//! executing them. This enables:
//! - Testability via mock interpreters that record every effect
//! - Logging/tracing of intended operations
//! - One retry and error classification policy per remote system, applied in
//!   its interpreter

pub mod board;
pub mod interpreter;
pub mod pipeline;

pub use board::{
    BoardEffect, BoardItem, BoardResponse, EntityInfo, FieldOption, ItemState, ProjectBoard,
    ProjectField, ProjectFieldKind,
};
pub use interpreter::{BoardInterpreter, PipelineInterpreter};
pub use pipeline::{
    Page, PipelineEffect, PipelineIssue, PipelineResponse, WorkspaceRepository, ZenHubIssue,
};
