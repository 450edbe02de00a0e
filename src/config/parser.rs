//! Configuration file parsing.
//!
//! The optional YAML file mirrors the command-line flags; a flag given on the
//! command line always wins over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result, SyncError};
use crate::filter::FilterOperator;

use super::settings::{CleanupPolicy, MissingDependencyPolicy};

/// A list given either as a YAML sequence or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ListSetting {
    /// `[a, b]`
    List(Vec<String>),
    /// `"a,b"`
    Csv(String),
}

impl ListSetting {
    /// Returns the trimmed, non-empty items.
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            Self::Csv(s) => s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        }
    }
}

/// Cleanup given either as a YAML boolean or as `force`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CleanupSetting {
    /// `true` / `false`
    Flag(bool),
    /// `"true"`, `"false"` or `"force"`
    Named(CleanupPolicy),
}

impl From<CleanupSetting> for CleanupPolicy {
    fn from(setting: CleanupSetting) -> Self {
        match setting {
            CleanupSetting::Flag(true) => Self::Allow,
            CleanupSetting::Flag(false) => Self::Off,
            CleanupSetting::Named(policy) => policy,
        }
    }
}

/// Contents of the configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Source API URL.
    pub source_api_url: Option<String>,
    /// Source API key.
    pub source_api_key: Option<String>,
    /// Source application key.
    pub source_app_key: Option<String>,
    /// Destination API URL.
    pub destination_api_url: Option<String>,
    /// Destination API key.
    pub destination_api_key: Option<String>,
    /// Destination application key.
    pub destination_app_key: Option<String>,
    /// Selected resource types.
    pub resources: Option<ListSetting>,
    /// Upper bound on concurrent API operations.
    pub max_workers: Option<usize>,
    /// Cleanup policy.
    pub cleanup: Option<CleanupSetting>,
    /// Missing dependency policy.
    pub missing_dependencies: Option<MissingDependencyPolicy>,
    /// Apply resources with unresolved references.
    pub skip_failed_resource_connections: Option<bool>,
    /// Filter expressions.
    pub filter: Option<Vec<String>>,
    /// Filter combining operator (`AND` / `OR`).
    pub filter_operator: Option<FilterOperator>,
    /// Per-request timeout in seconds.
    pub http_client_timeout: Option<u64>,
    /// Retry budget in seconds.
    pub http_client_retry_timeout: Option<u64>,
    /// Check credentials before doing any work.
    pub validate: Option<bool>,
    /// Root of source state files.
    pub source_resources_path: Option<PathBuf>,
    /// Root of destination state files.
    pub destination_resources_path: Option<PathBuf>,
    /// Tag added to managed resources.
    pub sync_tag: Option<String>,
    /// Disable the sync tag.
    pub no_sync_tag: Option<bool>,
}

/// Configuration parser for loading configuration files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is looked up in.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ConfigFile> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(SyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string. An empty document is an
    /// empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or has unknown keys.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ConfigFile> {
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            dotenvy::from_path(&env_path).map_err(|e| {
                SyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}
