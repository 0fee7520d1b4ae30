//! Board resolution.

pub mod matcher;

pub use matcher::{BoardTarget, configured_board_ids, resolve_boards};
