//! Organization-specific tag mapping.
//!
//! The mapping is a YAML file naming the tags to add, the aliases to fold and
//! the private locations and global variables to repoint. Every key is
//! optional; an absent key disables the matching step.
//!
//! ```yaml
//! team_tag: team:payments
//! business_unit_tag: business_unit:payments
//! env_aliases:
//!   dev: [payments-dev, payments-ci]
//!   prod: [payments-prod]
//! tag_key_swaps:
//!   legacy-asset-id: asset-id
//! tag_rewrites:
//!   - pattern: '(?i)^asset-id:a(\w+)$'
//!     replacement: 'asset-id:$1'
//! remove_tags: [business, busines]
//! required_tag_keys: [asset-id]
//! private_locations:
//!   pl:payments-prod-abc: [pl:old-prod-123]
//! global_variables:
//!   BOT_PASSWORD:
//!     id: 0f1e2d3c
//!     replaces: [9a8b7c6d]
//! ```

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{ConfigError, Result, SyncError};

use super::ops::TagRewrite;

/// Target id of a global variable and the ids it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSwap {
    /// Id the variable should point at.
    pub id: String,
    /// Ids known to stand for the same variable.
    #[serde(default)]
    pub replaces: Vec<String>,
}

/// A regex tag rewrite as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagRewriteSetting {
    /// Pattern a tag must match.
    pub pattern: String,
    /// Replacement, with `$1`-style group references.
    pub replacement: String,
}

/// Contents of the tag mapping file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagMapping {
    /// Team tag every resource gets. Dashboards are narrowed to it.
    pub team_tag: Option<String>,
    /// Business unit tag every resource except dashboards gets.
    pub business_unit_tag: Option<String>,
    /// Canonical environment to the `env:` values folded into it.
    pub env_aliases: BTreeMap<String, Vec<String>>,
    /// Old tag key to new tag key.
    pub tag_key_swaps: BTreeMap<String, String>,
    /// Regex rewrites applied to every tag.
    pub tag_rewrites: Vec<TagRewriteSetting>,
    /// Tags removed outright.
    pub remove_tags: Vec<String>,
    /// Resources with no tag containing one of these are reported.
    pub required_tag_keys: Vec<String>,
    /// Private location to the locations it replaces.
    pub private_locations: BTreeMap<String, Vec<String>>,
    /// Global variable name to the id it should point at.
    pub global_variables: BTreeMap<String, VariableSwap>,
}

impl TagMapping {
    /// Loads a mapping file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading tag mapping from: {}", path.display());

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

        Self::parse_yaml(&content, Some(path))
    }

    /// Parses a mapping from YAML. An empty document is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or has unknown keys.
    pub fn parse_yaml(content: &str, source: Option<&Path>) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("Tag mapping parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Compiles the regex rewrites.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first invalid pattern.
    pub fn rewrites(&self) -> std::result::Result<Vec<TagRewrite>, ConfigError> {
        self.tag_rewrites
            .iter()
            .map(|setting| {
                let pattern = Regex::new(&setting.pattern).map_err(|e| {
                    ConfigError::validation(format!("invalid pattern '{}': {e}", setting.pattern), "tag_rewrites")
                })?;
                Ok(TagRewrite {
                    pattern,
                    replacement: setting.replacement.clone(),
                })
            })
            .collect()
    }
}
