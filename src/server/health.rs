//! Liveness endpoint.

use axum::http::StatusCode;

/// Answers 200 `OK` while the process is serving. Says nothing about the
/// reachability of GitHub or ZenHub.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
