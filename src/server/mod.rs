//! HTTP server.
//!
//! # Endpoints
//!
//! - `POST /github` - GitHub webhook deliveries, HMAC-verified
//! - `POST /zenhub` - ZenHub webhook deliveries, JSON or form-encoded
//! - `POST /internal/event-cache` - gap-cache seeding from the import tool
//! - `GET /health` - liveness
//!
//! Request bodies over [`MAX_BODY_BYTES`] are rejected with 413.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;

use crate::effects::{BoardInterpreter, PipelineInterpreter};
use crate::reconcile::Reconciler;

pub mod health;
pub mod internal;
pub mod webhook;

pub use health::health_handler;
pub use internal::{INTERNAL_USER_AGENT, event_cache_handler};
pub use webhook::{WebhookError, github_handler, zenhub_handler};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state, passed to handlers via axum's `State`.
pub struct AppState<G, Z> {
    inner: Arc<AppStateInner<G, Z>>,
}

struct AppStateInner<G, Z> {
    reconciler: Arc<Reconciler<G, Z>>,

    /// Secret for verifying GitHub webhook signatures.
    webhook_secret: Vec<u8>,
}

impl<G, Z> Clone for AppState<G, Z> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, Z> AppState<G, Z> {
    pub fn new(reconciler: Arc<Reconciler<G, Z>>, webhook_secret: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                reconciler,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<G, Z>> {
        &self.inner.reconciler
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<G, Z>(app_state: AppState<G, Z>) -> axum::Router
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/github", post(github_handler::<G, Z>))
        .route("/zenhub", post(zenhub_handler::<G, Z>))
        .route("/internal/event-cache", post(event_cache_handler::<G, Z>))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
