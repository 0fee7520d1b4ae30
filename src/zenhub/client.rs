//! reqwest client for ZenHub's public GraphQL API.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::retry::{RetryConfig, retry_transient};

use super::error::ZenHubApiError;

const CLIENT_USER_AGENT: &str = concat!("board-sync/", env!("CARGO_PKG_VERSION"));

/// A client bound to one ZenHub workspace.
#[derive(Clone)]
pub struct ZenHubClient {
    http: reqwest::Client,
    api_url: String,
    workspace_id: String,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl ZenHubClient {
    pub fn new(
        token: &str,
        api_url: impl Into<String>,
        workspace_id: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self, ZenHubApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ZenHubApiError::permanent("token is not a valid header value"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(ZenHubApiError::from_transport)?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            workspace_id: workspace_id.into(),
            retry,
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Posts one GraphQL operation. A 429 is retried once after its
    /// `Retry-After`; an `errors` array in the body fails the call.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ZenHubApiError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        retry_transient(self.retry, || async {
            let response = self
                .http
                .post(&self.api_url)
                .json(&body)
                .send()
                .await
                .map_err(ZenHubApiError::from_transport)?;

            let status = response.status();
            if !status.is_success() {
                let headers = response.headers().clone();
                let text = response.text().await.unwrap_or_default();
                return Err(ZenHubApiError::from_status(status, &headers, &text));
            }

            let parsed: GraphQlResponse<T> = response
                .json()
                .await
                .map_err(ZenHubApiError::from_transport)?;

            if !parsed.errors.is_empty() {
                let message = parsed
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ZenHubApiError::permanent(message));
            }

            parsed
                .data
                .ok_or_else(|| ZenHubApiError::permanent("GraphQL response has no data"))
        })
        .await
    }
}

impl std::fmt::Debug for ZenHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenHubClient")
            .field("api_url", &self.api_url)
            .field("workspace_id", &self.workspace_id)
            .finish_non_exhaustive()
    }
}
