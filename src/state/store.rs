//! State store trait definition.
//!
//! This module defines the common interface for state storage backends.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::{Origin, ResourceMap};
use crate::error::Result;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the mapping of one type for one origin.
    ///
    /// A type that was never saved loads as an empty mapping.
    async fn load(&self, origin: Origin, resource_type: &str) -> Result<ResourceMap>;

    /// Saves the mapping of one type for one origin.
    async fn save(&self, origin: Origin, resource_type: &str, resources: &ResourceMap) -> Result<()>;

    /// Checks if a type has ever been saved for an origin.
    async fn exists(&self, origin: Origin, resource_type: &str) -> Result<bool>;

    /// Acquires the state lock.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Pushes back the expiry of a lock this process holds.
    ///
    /// Fails with `StateError::LockedByOther` if another run took the lock
    /// over in the meantime.
    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo>;

    /// Releases the state lock if `lock_id` still owns it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self, origin: Origin, resource_type: &str) -> Result<ResourceMap> {
        (**self).load(origin, resource_type).await
    }

    async fn save(&self, origin: Origin, resource_type: &str, resources: &ResourceMap) -> Result<()> {
        (**self).save(origin, resource_type, resources).await
    }

    async fn exists(&self, origin: Origin, resource_type: &str) -> Result<bool> {
        (**self).exists(origin, resource_type).await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder).await
    }

    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo> {
        (**self).refresh_lock(lock).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
