//! Sync configuration.
//!
//! The configuration document is read once at startup and never reloaded. It
//! describes the global board every entity lands on, the label mappings that
//! add further boards, the ZenHub pipelines, and a few naming conventions
//! shared by both systems.
//!
//! A missing document yields [`SyncConfig::default`], which has no global
//! board. The server still starts in that state but every reconciliation is
//! abandoned with [`ConfigError::NoGlobalBoard`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BoardId, FieldId, PipelineId};

mod commented;
pub mod settings;

pub use commented::commented;
pub use settings::{Settings, SettingsError};

/// Errors raised while loading or using the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("board {board} is missing {field}")]
    MissingField { board: String, field: &'static str },

    #[error("no global board is configured")]
    NoGlobalBoard,
}

/// Which system wins when the two disagree.
///
/// Parsed and exposed, but reconciliation always follows the most recent
/// change regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOfTruth {
    #[default]
    Zenhub,
    Github,
}

/// What to do when a board's value differs from the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchBehavior {
    #[default]
    Overwrite,
    Ignore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultProperties {
    #[serde(default, deserialize_with = "commented")]
    pub source_of_truth: SourceOfTruth,
    #[serde(default, deserialize_with = "commented")]
    pub behavior_when_mismatch: MismatchBehavior,
}

/// A ZenHub pipeline. Its name doubles as the status option name on boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(deserialize_with = "commented")]
    pub id: PipelineId,
    #[serde(deserialize_with = "commented")]
    pub name: String,
    #[serde(default, deserialize_with = "commented")]
    pub description: String,
}

/// One option of a board's single-select status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub id: String,
    pub name: String,
}

/// A destination board and the field ids needed to write to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    #[serde(default, deserialize_with = "commented")]
    pub github_board_id: BoardId,
    #[serde(default, deserialize_with = "commented")]
    pub status_field_id: FieldId,
    #[serde(default, deserialize_with = "commented")]
    pub status_field_options: Vec<StatusOption>,
    #[serde(default, deserialize_with = "commented")]
    pub estimate_field_id: FieldId,
    #[serde(default, deserialize_with = "commented")]
    pub source_of_truth: Option<SourceOfTruth>,
    #[serde(default, deserialize_with = "commented")]
    pub behavior_when_mismatch: Option<MismatchBehavior>,
}

/// Adds `board` for every entity carrying all of `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    #[serde(default, deserialize_with = "commented")]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub board: BoardConfig,
}

/// Status names with special meaning to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNames {
    /// Status for freshly opened entities, and for a cleared status field.
    #[serde(default = "default_new_status", deserialize_with = "commented")]
    pub new: String,
    #[serde(default = "default_closed_status", deserialize_with = "commented")]
    pub closed: String,
}

impl Default for StatusNames {
    fn default() -> Self {
        Self {
            new: default_new_status(),
            closed: default_closed_status(),
        }
    }
}

/// Board field names the dispatcher reacts to in item-edited events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    #[serde(default = "default_status_field", deserialize_with = "commented")]
    pub status: String,
    #[serde(default = "default_estimate_field", deserialize_with = "commented")]
    pub estimate: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            status: default_status_field(),
            estimate: default_estimate_field(),
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default, deserialize_with = "commented")]
    pub default_properties: DefaultProperties,
    #[serde(default, deserialize_with = "commented")]
    pub zenhub_pipelines: Vec<Pipeline>,
    #[serde(default, deserialize_with = "commented")]
    pub label_mappings: Vec<LabelMapping>,
    #[serde(default, deserialize_with = "commented")]
    pub global_board: Option<BoardConfig>,
    /// Repositories whose webhooks are processed. Empty allows every
    /// repository.
    #[serde(default, deserialize_with = "commented")]
    pub allowed_repositories: Vec<String>,
    /// The only organization accepted on ZenHub webhooks.
    #[serde(default = "default_organization", deserialize_with = "commented")]
    pub organization: String,
    #[serde(default, deserialize_with = "commented")]
    pub statuses: StatusNames,
    #[serde(default, deserialize_with = "commented")]
    pub field_names: FieldNames,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_properties: DefaultProperties::default(),
            zenhub_pipelines: Vec::new(),
            label_mappings: Vec::new(),
            global_board: None,
            allowed_repositories: Vec::new(),
            organization: default_organization(),
            statuses: StatusNames::default(),
            field_names: FieldNames::default(),
        }
    }
}

fn default_new_status() -> String {
    "New Issues".to_string()
}

fn default_closed_status() -> String {
    "Closed".to_string()
}

fn default_status_field() -> String {
    "Status".to_string()
}

fn default_estimate_field() -> String {
    "Estimate".to_string()
}

fn default_organization() -> String {
    "apify".to_string()
}

impl SyncConfig {
    /// Loads and validates the configuration at `path`.
    ///
    /// A missing file is not an error; the default configuration is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// a configured board lacks one of its field ids.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the document as YAML. Values are written plainly, without
    /// explanation envelopes.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }

    /// Writes the document to `path`, replacing any existing file. The new
    /// content is written next to it first and then renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_yaml()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        std::fs::write(&staging, content).map_err(write_err)?;
        std::fs::rename(&staging, path).map_err(write_err)?;
        tracing::info!(path = %path.display(), "Wrote config");
        Ok(())
    }

    /// Parses a configuration document without validating it.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Checks that every configured board exposes a board id and both field
    /// ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let boards = self
            .global_board
            .iter()
            .chain(self.label_mappings.iter().map(|m| &m.board));

        for (index, board) in boards.enumerate() {
            let name = if board.github_board_id.as_str().is_empty() {
                format!("#{index}")
            } else {
                board.github_board_id.to_string()
            };

            if board.github_board_id.as_str().is_empty() {
                return Err(ConfigError::MissingField {
                    board: name,
                    field: "githubBoardId",
                });
            }
            if board.status_field_id.as_str().is_empty() {
                return Err(ConfigError::MissingField {
                    board: name,
                    field: "statusFieldId",
                });
            }
            if board.estimate_field_id.as_str().is_empty() {
                return Err(ConfigError::MissingField {
                    board: name,
                    field: "estimateFieldId",
                });
            }
        }

        Ok(())
    }

    /// Returns true if webhooks from `repository` should be processed.
    pub fn allows_repository(&self, repository: &str) -> bool {
        self.allowed_repositories.is_empty()
            || self.allowed_repositories.iter().any(|r| r == repository)
    }

    /// Looks up a pipeline by its name.
    pub fn pipeline_by_name(&self, name: &str) -> Option<&Pipeline> {
        self.zenhub_pipelines.iter().find(|p| p.name == name)
    }
}
