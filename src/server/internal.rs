//! Loopback endpoint for seeding the gap cache.
//!
//! The import tool writes to boards through its own process, so the server
//! never sees those writes as its own. Before each write it posts the change
//! here; the board webhooks that follow are then dropped as echoes.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use serde_json::{Value, json};
use tracing::debug;

use super::AppState;
use super::webhook::WebhookError;
use crate::effects::{BoardInterpreter, PipelineInterpreter};
use crate::reconcile::GapEntry;

/// The only user agent accepted on the internal endpoint.
pub const INTERNAL_USER_AGENT: &str = "board-sync/internal";

pub async fn event_cache_handler<G, Z>(
    State(app_state): State<AppState<G, Z>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError>
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
{
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    if user_agent != Some(INTERNAL_USER_AGENT) {
        return Err(WebhookError::Unauthorized);
    }

    let entry: GapEntry = serde_json::from_slice(&body).map_err(WebhookError::InvalidGapEntry)?;
    debug!(entity = %entry.entity_id, "Seeding gap cache from loopback");

    app_state.reconciler().gaps().record(&entry.into_event());

    Ok(Json(json!({ "message": "Event cached" })))
}
