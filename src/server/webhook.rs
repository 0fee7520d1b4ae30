//! Webhook endpoint handlers.
//!
//! Both endpoints validate and normalize the delivery, acknowledge it, and
//! run the reconciliation in a spawned task. Senders never wait on (or see
//! the result of) the board and pipeline writes.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::effects::{BoardInterpreter, PipelineInterpreter};
use crate::reconcile::Outcome;
use crate::webhooks::{
    ParseError, SignatureError, parse_github_webhook, parse_zenhub_form, parse_zenhub_json,
    verify_signature,
};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors that reject an inbound request before it is acknowledged.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("malformed payload: {0}")]
    Malformed(#[from] ParseError),

    #[error("unsupported content type {0:?}")]
    UnsupportedMediaType(String),

    #[error("organization {0:?} is not handled here")]
    WrongOrganization(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid gap entry: {0}")]
    InvalidGapEntry(#[source] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Malformed(_) => StatusCode::BAD_REQUEST,
            WebhookError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WebhookError::WrongOrganization(_) => StatusCode::BAD_REQUEST,
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidGapEntry(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn handled() -> Json<Value> {
    Json(json!({ "handled": true }))
}

/// GitHub webhook handler.
///
/// # Response
///
/// - 200 `{"handled":true}`: verified and parsed, including events that
///   are ignored
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: signature mismatch
pub async fn github_handler<G, Z>(
    State(app_state): State<AppState<G, Z>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError>
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
{
    // Verify the signature before looking at anything else in the request.
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    if let Err(e) = verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(error = %e, "Invalid webhook signature");
        return Err(e.into());
    }

    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = headers
        .get(HEADER_DELIVERY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(event) = parse_github_webhook(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring GitHub event");
        return Ok(handled());
    };

    debug!(delivery_id = %delivery_id, event = ?event, "Accepted GitHub webhook");

    let reconciler = Arc::clone(app_state.reconciler());
    tokio::spawn(async move {
        match reconciler.handle_github(event).await {
            Ok(outcome) => log_outcome(&delivery_id, &outcome),
            Err(e) => error!(delivery_id = %delivery_id, error = %e, "GitHub reconciliation failed"),
        }
    });

    Ok(handled())
}

/// ZenHub webhook handler. ZenHub signs nothing, so the organization check
/// is the only gate.
pub async fn zenhub_handler<G, Z>(
    State(app_state): State<AppState<G, Z>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError>
where
    G: BoardInterpreter,
    Z: PipelineInterpreter,
{
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = if content_type.starts_with(FORM_CONTENT_TYPE) {
        parse_zenhub_form(&body)?
    } else if content_type.starts_with(JSON_CONTENT_TYPE) {
        parse_zenhub_json(&body)?
    } else {
        return Err(WebhookError::UnsupportedMediaType(content_type.to_string()));
    };

    let organization = &app_state.reconciler().config().organization;
    if &event.organization != organization {
        warn!(organization = %event.organization, "ZenHub webhook for another organization");
        return Err(WebhookError::WrongOrganization(event.organization));
    }

    debug!(event = ?event, "Accepted ZenHub webhook");

    let reconciler = Arc::clone(app_state.reconciler());
    tokio::spawn(async move {
        let label = format!("{}{}", event.repo, event.number);
        match reconciler.handle_zenhub(event).await {
            Ok(outcome) => log_outcome(&label, &outcome),
            Err(e) => error!(issue = %label, error = %e, "ZenHub reconciliation failed"),
        }
    });

    Ok(handled())
}

fn log_outcome(context: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Applied(report) if !report.failed.is_empty() => warn!(
            context,
            applied = report.applied.len(),
            failed = ?report.failed,
            "Reconciliation partially failed"
        ),
        Outcome::Applied(report) => info!(
            context,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Reconciliation applied"
        ),
        Outcome::Suppressed => debug!(context, "Reconciliation suppressed as echo"),
        Outcome::Ignored(reason) => debug!(context, reason, "Reconciliation ignored"),
    }
}

/// Extracts a required header value as a string.
pub(super) fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
