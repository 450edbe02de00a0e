//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the optional YAML configuration file and `.env`
//! - Merging flags, file and defaults into an immutable [`SyncConfig`]
//! - Resolving and validating the resource type selection

mod builder;
mod parser;
mod settings;

pub use builder::{resolve_selection, ConfigBuilder};
pub use parser::{CleanupSetting, ConfigFile, ConfigParser, ListSetting};
pub use settings::{
    CleanupPolicy, Command, MissingDependencyPolicy, SyncConfig, DEFAULT_MAX_WORKERS, DEFAULT_SYNC_TAG,
};
