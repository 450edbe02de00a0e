// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # datadog-sync
//!
//! Copies Datadog configuration (monitors, dashboards, SLOs, synthetics,
//! pipelines, roles, users, ...) from a source organization to a destination
//! organization, and keeps the copy in step.
//!
//! ## Overview
//!
//! Every run works against two local state trees, one per organization,
//! holding the last known body of each resource keyed by its source
//! identifier:
//!
//! - `import` lists the source organization into source state
//! - `sync` applies source state to the destination and records the results
//!   into destination state
//! - `diffs` reports what `sync` would change
//! - `migrate` runs `import` then `sync`
//! - `tag` rewrites the tags of one type's source state in place
//!
//! ## Architecture
//!
//! Resources embed identifiers of other resources (a dashboard widget points
//! at a monitor, a monitor restricts itself to roles). Those references are
//! declared per type as connections; the engine orders types so that
//! referenced types are applied first and rewrites each embedded source
//! identifier into its destination counterpart before sending a body.
//!
//! ## Modules
//!
//! - [`config`]: Flag, file and environment configuration
//! - [`client`]: Datadog HTTP client with retries
//! - [`resources`]: Resource type contract and the supported types
//! - [`engine`]: Import, reference resolution, apply, diff and cleanup
//! - [`state`]: Per-origin state storage and locking
//! - [`runner`]: Runs one command end to end
//! - [`tagging`]: Offline tag rewriting of source state
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # datadog-sync.yaml
//! source_api_url: https://api.datadoghq.com
//! destination_api_url: https://api.datadoghq.eu
//! resources: [monitors, dashboards, service_level_objectives]
//! cleanup: false
//! missing_dependencies: force
//! filter:
//!   - "Type=monitors;Name=tags;Value=team:core"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod body;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod resources;
pub mod runner;
pub mod state;
pub mod tagging;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use client::ApiClient;
pub use config::{ConfigBuilder, ConfigParser, SyncConfig};
pub use engine::{ApplyScheduler, CleanupStage, DiffEngine, DiffReport, Importer, RunSummary};
pub use error::{Result, SyncError};
pub use resources::{ResourceRegistry, ResourceType};
pub use runner::{RunReport, SyncRunner};
pub use state::{LocalStateStore, State, StateStore};
