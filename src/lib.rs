//! Board Sync - keeps GitHub Projects V2 boards and ZenHub pipelines in
//! agreement by relaying webhook changes between the two.
//!
//! Boards are chosen from an entity's labels, every relayed write is
//! remembered briefly so its echo is dropped, and changes to one entity are
//! applied one at a time.

pub mod boards;
pub mod cache;
pub mod config;
pub mod effects;
pub mod github;
pub mod import;
pub mod reconcile;
pub mod retry;
pub mod server;
pub mod setup;
pub mod types;
pub mod webhooks;
pub mod zenhub;

#[cfg(test)]
pub mod test_utils;
