//! ZenHub pipeline interpreter.
//!
//! Executes [`PipelineEffect`](crate::effects::PipelineEffect)s against
//! ZenHub's public GraphQL API with reqwest. Rate-limited responses are
//! retried once after the advertised `Retry-After`.

mod client;
mod error;
mod interpreter;

pub use client::ZenHubClient;
pub use error::ZenHubApiError;
