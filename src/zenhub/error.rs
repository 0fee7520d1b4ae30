//! ZenHub API errors.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

use crate::retry::{ErrorKind, RemoteError};

#[derive(Debug, Error)]
#[error("ZenHub API error: {message}")]
pub struct ZenHubApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    /// Seconds from the `Retry-After` header of a 429 response.
    pub retry_after: Option<Duration>,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl RemoteError for ZenHubApiError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl ZenHubApiError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            status: None,
            retry_after: None,
            message: message.into(),
            source: None,
        }
    }

    /// Classifies a non-success HTTP response.
    ///
    /// 429 and 5xx are transient; a 429 carries its `Retry-After` delay.
    pub fn from_status(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let kind = if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ErrorKind::Transient
        } else {
            ErrorKind::Permanent
        };

        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
            parse_retry_after(headers)
        } else {
            None
        };

        Self {
            kind,
            status: Some(status.as_u16()),
            retry_after,
            message: format!("{}: {}", status, truncate(body, 200)),
            source: None,
        }
    }

    /// Connection failures and timeouts are transient.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            ErrorKind::Transient
        } else {
            ErrorKind::Permanent
        };

        Self {
            kind,
            status: err.status().map(|s| s.as_u16()),
            retry_after: None,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
