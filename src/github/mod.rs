//! GitHub Projects V2 interpreter.
//!
//! Executes [`BoardEffect`](crate::effects::BoardEffect)s as GraphQL
//! operations through octocrab. Transient failures (rate limits, 5xx,
//! network errors) are retried once via [`crate::retry`].

mod client;
mod error;
mod interpreter;

pub use client::GitHubClient;
pub use error::{GitHubApiError, GraphQlError};
