//! CLI module for the datadog-sync tool.
//!
//! This module provides the command-line interface for copying
//! Datadog configuration between organizations.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, SyncArgs, TagArgs};
pub use output::OutputFormatter;
