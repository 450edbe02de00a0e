//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{CleanupPolicy, Command, MissingDependencyPolicy};
use crate::filter::FilterOperator;
use crate::tagging::TagOptions;

/// datadog-sync - Copy Datadog configuration between organizations.
#[derive(Parser, Debug)]
#[command(name = "datadog-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML configuration file whose keys mirror the flags.
    #[arg(short, long, global = true, env = "DD_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import resources from the source organization into source state.
    Import(SyncArgs),

    /// Apply source state to the destination organization.
    Sync(SyncArgs),

    /// Show what sync would change, without changing anything.
    Diffs(SyncArgs),

    /// Import then sync in one run.
    Migrate(SyncArgs),

    /// Rewrite the tags of one type's source state, keeping a backup.
    Tag(TagArgs),
}

impl Commands {
    /// Splits a sync subcommand into the command and its arguments.
    /// Returns `None` for `tag`, which works on local state only.
    #[must_use]
    pub const fn parts(&self) -> Option<(Command, &SyncArgs)> {
        match self {
            Self::Import(args) => Some((Command::Import, args)),
            Self::Sync(args) => Some((Command::Sync, args)),
            Self::Diffs(args) => Some((Command::Diffs, args)),
            Self::Migrate(args) => Some((Command::Migrate, args)),
            Self::Tag(_) => None,
        }
    }
}

/// Arguments shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Resource types to process (comma separated or repeated). Defaults to all.
    #[arg(long, value_delimiter = ',')]
    pub resources: Vec<String>,

    /// Maximum number of concurrent API operations.
    #[arg(long, env = "DD_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Delete destination resources that no longer exist in the source.
    #[arg(long, value_enum, env = "DD_CLEANUP")]
    pub cleanup: Option<CleanupPolicy>,

    /// What to do with references that have no destination counterpart.
    #[arg(long, value_enum, env = "DD_MISSING_DEPENDENCIES")]
    pub missing_dependencies: Option<MissingDependencyPolicy>,

    /// Apply resources even when some of their references cannot be resolved.
    #[arg(long)]
    pub skip_failed_resource_connections: bool,

    /// Filter expression `Type=<type>;Name=<attr>;Value=<regex>[;Operator=SubString|ExactMatch]`.
    #[arg(long)]
    pub filter: Vec<String>,

    /// How filters on the same type are combined.
    #[arg(long, env = "DD_FILTER_OPERATOR")]
    pub filter_operator: Option<FilterOperator>,

    /// Source API URL.
    #[arg(long, env = "DD_SOURCE_API_URL")]
    pub source_api_url: Option<String>,

    /// Source API key.
    #[arg(long, env = "DD_SOURCE_API_KEY", hide_env_values = true)]
    pub source_api_key: Option<String>,

    /// Source application key.
    #[arg(long, env = "DD_SOURCE_APP_KEY", hide_env_values = true)]
    pub source_app_key: Option<String>,

    /// Destination API URL.
    #[arg(long, env = "DD_DESTINATION_API_URL")]
    pub destination_api_url: Option<String>,

    /// Destination API key.
    #[arg(long, env = "DD_DESTINATION_API_KEY", hide_env_values = true)]
    pub destination_api_key: Option<String>,

    /// Destination application key.
    #[arg(long, env = "DD_DESTINATION_APP_KEY", hide_env_values = true)]
    pub destination_app_key: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DD_HTTP_CLIENT_TIMEOUT")]
    pub http_client_timeout: Option<u64>,

    /// Total time in seconds a request may spend retrying.
    #[arg(long, env = "DD_HTTP_CLIENT_RETRY_TIMEOUT")]
    pub http_client_retry_timeout: Option<u64>,

    /// Check credentials before doing any work.
    #[arg(long, env = "DD_VALIDATE")]
    pub validate: Option<bool>,

    /// Directory of source state files.
    #[arg(long, env = "DD_SOURCE_RESOURCES_PATH")]
    pub source_resources_path: Option<PathBuf>,

    /// Directory of destination state files.
    #[arg(long, env = "DD_DESTINATION_RESOURCES_PATH")]
    pub destination_resources_path: Option<PathBuf>,

    /// Tag added to every managed resource that supports tags.
    #[arg(long, env = "DD_SYNC_TAG")]
    pub sync_tag: Option<String>,

    /// Do not add the sync tag.
    #[arg(long, conflicts_with = "sync_tag")]
    pub no_sync_tag: bool,

    /// Run cleanup without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments of the `tag` command.
#[derive(Args, Debug, Clone, Default)]
pub struct TagArgs {
    /// Resource type whose source state is rewritten.
    #[arg(short, long)]
    pub resource: String,

    /// Keep only resources with one of these names.
    #[arg(long, num_args = 1..)]
    pub names: Vec<String>,

    /// Keep only resources carrying this tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Set the retry count of synthetic tests to 0.
    #[arg(long = "change-retry-to-0")]
    pub change_retry_to_0: bool,

    /// Set `tick_every` to one week where present.
    #[arg(long)]
    pub weekly_ticks: bool,

    /// YAML file with the organization-specific tag mapping.
    #[arg(long, env = "DD_TAG_MAPPING")]
    pub mapping: Option<PathBuf>,

    /// Directory of source state files.
    #[arg(long, env = "DD_SOURCE_RESOURCES_PATH")]
    pub source_resources_path: Option<PathBuf>,
}

impl TagArgs {
    /// Returns the retagging options these arguments ask for.
    #[must_use]
    pub fn options(&self) -> TagOptions {
        TagOptions {
            resource_type: self.resource.clone(),
            names: self.names.clone(),
            tag: self.tag.clone(),
            zero_retries: self.change_retry_to_0,
            weekly_ticks: self.weekly_ticks,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
