//! Sync engine.
//!
//! - [`Importer`] copies source resources into source state
//! - [`ApplyScheduler`] applies source state to the destination in
//!   dependency order
//! - [`DiffEngine`] reports what an apply would change
//! - [`CleanupStage`] deletes destination resources that left the source

mod cleanup;
mod diff;
mod graph;
mod importer;
mod resolver;
mod scheduler;
mod summary;

pub use cleanup::CleanupStage;
pub use diff::{diff_bodies, strip_excluded, ChangeKind, DiffEngine, DiffReport, DiffType, FieldChange, ResourceDiff};
pub use graph::{dependency_groups, flatten};
pub use importer::Importer;
pub use resolver::{describe, prepare_body, resolve_references, UnresolvedReference};
pub use scheduler::{ApplyScheduler, MAX_RESOLUTION_PASSES};
pub use summary::{RunSummary, TypeSummary};
