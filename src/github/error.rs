//! GitHub API error types.
//!
//! Errors are classified for the retry policy in `crate::retry`:
//!
//! - **Transient**: HTTP 5xx, HTTP 429, HTTP 403 carrying a rate-limit
//!   message, GraphQL `RATE_LIMITED` errors and network failures.
//! - **Permanent**: everything else, including GraphQL errors such as
//!   `NOT_FOUND` that come back with HTTP 200.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::retry::{ErrorKind, RemoteError};

/// A GitHub API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: ErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl RemoteError for GitHubApiError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// octocrab doesn't surface response headers on errors, so the configured
    /// default delay always applies.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl GitHubApiError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Classifies the `errors` array of a GraphQL response.
    pub fn from_graphql(errors: &[GraphQlError]) -> Self {
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        let rate_limited = errors.iter().any(|e| {
            e.kind.as_deref() == Some("RATE_LIMITED") || is_rate_limit_error(&e.message)
        });

        if rate_limited {
            Self::transient(message)
        } else {
            Self::permanent(message)
        }
    }

    /// Categorizes an octocrab error by status code, then by message.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&err);
        let message = err.to_string();

        let kind = match status_code {
            Some(429) => ErrorKind::Transient,
            Some(403) if is_rate_limit_error(&message) => ErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => ErrorKind::Transient,
            Some(_) => ErrorKind::Permanent,
            None if is_network_error(&message) => ErrorKind::Transient,
            None => ErrorKind::Permanent,
        };

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Extracts the HTTP status code from an octocrab error.
    ///
    /// API errors carry it directly. For the remaining variants the message is
    /// searched for a `status: NNN` fragment, which is what octocrab's
    /// transport errors render.
    fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
        if let octocrab::Error::GitHub { source, .. } = err {
            return Some(source.status_code.as_u16());
        }

        let text = err.to_string();
        let rest = &text[text.find("status: ")? + "status: ".len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// One entry of a GraphQL response's `errors` array.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gql(message: &str, kind: Option<&str>) -> GraphQlError {
        GraphQlError {
            message: message.to_string(),
            kind: kind.map(String::from),
        }
    }

    #[test]
    fn rate_limit_detection() {
        assert!(is_rate_limit_error("API rate limit exceeded"));
        assert!(is_rate_limit_error("You have exceeded a secondary rate limit"));
        assert!(!is_rate_limit_error("Resource not accessible by integration"));
    }

    #[test]
    fn network_error_detection() {
        assert!(is_network_error("connection reset by peer"));
        assert!(is_network_error("request timed out"));
        assert!(!is_network_error("Could not resolve to a node"));
    }

    #[test]
    fn graphql_rate_limited_is_transient() {
        let err = GitHubApiError::from_graphql(&[gql("slow down", Some("RATE_LIMITED"))]);
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[test]
    fn graphql_not_found_is_permanent() {
        let err = GitHubApiError::from_graphql(&[
            gql("Could not resolve to a node with the global id", Some("NOT_FOUND")),
            gql("second", None),
        ]);
        assert_eq!(err.kind, ErrorKind::Permanent);
        assert!(err.message.contains("; second"));
    }

    #[test]
    fn display_includes_status() {
        let mut err = GitHubApiError::permanent("Bad credentials");
        err.status_code = Some(401);
        assert_eq!(err.to_string(), "GitHub API error (HTTP 401): Bad credentials");
    }
}
