//! State management module.
//!
//! This module persists what was imported from the source organization and
//! what was created in the destination organization, one file per origin and
//! resource type.

mod local;
mod lock;
mod store;
mod types;

pub use local::{DEFAULT_DESTINATION_PATH, DEFAULT_SOURCE_PATH, LocalStateStore};
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS, LOCK_REFRESH_SECS};
pub use store::StateStore;
pub use types::{Origin, ResourceMap, State};
