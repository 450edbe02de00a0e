//! Settings of one invocation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::client::ClientSettings;
use crate::filter::FilterSet;

/// Default upper bound on concurrent API operations.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Tag added to every managed resource that supports tags.
pub const DEFAULT_SYNC_TAG: &str = "managed_by:datadog-sync";

/// The command being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Copy source resources into source state.
    Import,
    /// Apply source state to the destination.
    Sync,
    /// Report what `sync` would change.
    Diffs,
    /// `import` followed by `sync`.
    Migrate,
}

impl Command {
    /// Returns true if the command talks to the source organization.
    #[must_use]
    pub const fn uses_source(self) -> bool {
        matches!(self, Self::Import | Self::Migrate)
    }

    /// Returns true if the command talks to the destination organization.
    #[must_use]
    pub const fn uses_destination(self) -> bool {
        matches!(self, Self::Sync | Self::Diffs | Self::Migrate)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Sync => write!(f, "sync"),
            Self::Diffs => write!(f, "diffs"),
            Self::Migrate => write!(f, "migrate"),
        }
    }
}

/// What to do with destination resources that left the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum CleanupPolicy {
    /// Leave them alone.
    #[default]
    #[value(name = "false")]
    #[serde(rename = "false")]
    Off,
    /// Delete them after confirmation.
    #[value(name = "true")]
    #[serde(rename = "true")]
    Allow,
    /// Delete them without asking.
    #[value(name = "force")]
    #[serde(rename = "force")]
    Force,
}

/// What to do with references that have no destination counterpart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDependencyPolicy {
    /// Skip the referencing resource and count it as failed.
    #[default]
    Fail,
    /// Apply the resource with the source identifiers left in place.
    Skip,
    /// Import and apply the missing resources first.
    Force,
}

/// Immutable settings of one invocation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Command being run.
    pub command: Command,
    /// Source organization.
    pub source: ClientSettings,
    /// Destination organization.
    pub destination: ClientSettings,
    /// Selected resource types.
    pub resources: Vec<String>,
    /// Upper bound on concurrent API operations.
    pub max_workers: usize,
    /// Cleanup policy.
    pub cleanup: CleanupPolicy,
    /// Missing dependency policy.
    pub missing_dependencies: MissingDependencyPolicy,
    /// Apply resources with unresolved references regardless of the policy.
    pub skip_failed_resource_connections: bool,
    /// Resource filters.
    pub filters: FilterSet,
    /// Check credentials before doing any work.
    pub validate: bool,
    /// Root of source state files.
    pub source_resources_path: PathBuf,
    /// Root of destination state files.
    pub destination_resources_path: PathBuf,
    /// Tag added to managed resources, if any.
    pub sync_tag: Option<String>,
}

impl SyncConfig {
    /// Returns true if resources with unresolved references are applied anyway.
    #[must_use]
    pub fn applies_unresolved(&self) -> bool {
        self.skip_failed_resource_connections || self.missing_dependencies == MissingDependencyPolicy::Skip
    }

    /// Returns true if missing dependencies are imported and applied first.
    #[must_use]
    pub fn forces_dependencies(&self) -> bool {
        self.missing_dependencies == MissingDependencyPolicy::Force
    }
}
