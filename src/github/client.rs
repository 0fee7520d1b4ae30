//! Octocrab client wrapper scoped to one organization.
//!
//! Board effects don't name an organization; every repository lookup goes
//! through the organization this client was built for.

use octocrab::Octocrab;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::retry::{RetryConfig, retry_transient};

use super::error::{GitHubApiError, GraphQlError};

#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    organization: String,
    retry: RetryConfig,
}

/// The envelope of every GraphQL response.
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

impl GitHubClient {
    pub fn new(client: Octocrab, organization: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            organization: organization.into(),
            retry,
        }
    }

    /// Creates a client authenticated with a personal access token.
    pub fn from_token(
        token: impl Into<String>,
        organization: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, organization, retry))
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Runs a GraphQL operation, retrying transient failures once.
    ///
    /// A response with a non-empty `errors` array is an error even if `data`
    /// is partially present.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, GitHubApiError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        retry_transient(self.retry, || async {
            let response: GraphQlResponse<T> = self
                .client
                .graphql(&body)
                .await
                .map_err(GitHubApiError::from_octocrab)?;

            if !response.errors.is_empty() {
                return Err(GitHubApiError::from_graphql(&response.errors));
            }
            response
                .data
                .ok_or_else(|| GitHubApiError::permanent("GraphQL response has no data"))
        })
        .await
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}
