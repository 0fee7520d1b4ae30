//! Process settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default ZenHub GraphQL endpoint.
pub const DEFAULT_ZENHUB_API_URL: &str = "https://api.zenhub.com/public/graphql";

/// Default config document path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Secrets and endpoints needed to run the server or the import.
#[derive(Clone)]
pub struct Settings {
    pub github_token: String,
    pub zenhub_token: String,
    pub zenhub_workspace_id: String,
    pub webhook_secret: Vec<u8>,
    pub port: u16,
    pub config_path: PathBuf,
    pub zenhub_api_url: String,
    /// Base URL of a running server, used by the import to reach the
    /// internal gap-cache endpoint.
    pub internal_url: String,
    /// Wait applied to a rate-limited response that carries no `Retry-After`.
    pub default_retry_after: Duration,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(SettingsError::Missing(key));

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| SettingsError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let default_retry_after = match get("BOARD_SYNC_RETRY_AFTER_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| SettingsError::Invalid {
                name: "BOARD_SYNC_RETRY_AFTER_SECS",
                value: raw,
            })?),
            None => Duration::from_secs(5),
        };

        Ok(Settings {
            github_token: require("GITHUB_TOKEN")?,
            zenhub_token: require("ZENHUB_TOKEN")?,
            zenhub_workspace_id: require("ZENHUB_WORKSPACE_ID")?,
            webhook_secret: require("GITHUB_WEBHOOK_SECRET")?.into_bytes(),
            port,
            config_path: get("BOARD_SYNC_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            zenhub_api_url: get("ZENHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_ZENHUB_API_URL.to_string()),
            internal_url: get("BOARD_SYNC_INTERNAL_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            default_retry_after,
        })
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("zenhub_workspace_id", &self.zenhub_workspace_id)
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("zenhub_api_url", &self.zenhub_api_url)
            .field("internal_url", &self.internal_url)
            .finish_non_exhaustive()
    }
}
