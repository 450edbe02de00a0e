//! Local file-based state storage backend.
//!
//! Each origin has its own root directory holding one pretty-printed JSON
//! file per resource type (`<root>/<type>.json`).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StateError, SyncError};

use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::{Origin, ResourceMap};

/// Default root for source state files.
pub const DEFAULT_SOURCE_PATH: &str = "resources/source";

/// Default root for destination state files.
pub const DEFAULT_DESTINATION_PATH: &str = "resources/destination";

/// Lock file name.
const LOCK_FILE: &str = ".datadog-sync.lock";

/// Local file-based state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    /// Root directory for source state files.
    source_dir: PathBuf,
    /// Root directory for destination state files.
    destination_dir: PathBuf,
}

impl LocalStateStore {
    /// Creates a store with explicit roots for each origin.
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
        }
    }

    /// Creates a store with `source/` and `destination/` under a base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        Self::new(base.join("source"), base.join("destination"))
    }

    /// Returns the root directory for an origin.
    #[must_use]
    pub fn root(&self, origin: Origin) -> &Path {
        match origin {
            Origin::Source => &self.source_dir,
            Origin::Destination => &self.destination_dir,
        }
    }

    /// Returns the state file path for one type.
    #[must_use]
    pub fn file_path(&self, origin: Origin, resource_type: &str) -> PathBuf {
        self.root(origin).join(format!("{resource_type}.json"))
    }

    fn lock_paths(&self) -> [PathBuf; 2] {
        [
            self.source_dir.join(LOCK_FILE),
            self.destination_dir.join(LOCK_FILE),
        ]
    }

    /// Ensures a directory exists.
    async fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            debug!("Creating state directory: {}", dir.display());
            fs::create_dir_all(dir).await.map_err(|e| {
                SyncError::State(StateError::WriteFailed {
                    path: dir.to_path_buf(),
                    message: format!("Failed to create state directory: {e}"),
                })
            })?;
        }
        Ok(())
    }

    /// Writes `content` to `path` through a temporary file and a rename.
    async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let write_failed = |message: String| {
            SyncError::State(StateError::WriteFailed {
                path: path.to_path_buf(),
                message,
            })
        };

        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| write_failed(format!("Failed to create temp file: {e}")))?;

        file.write_all(content)
            .await
            .map_err(|e| write_failed(format!("Failed to write temp file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| write_failed(format!("Failed to sync temp file: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| write_failed(format!("Failed to rename temp file: {e}")))?;

        Ok(())
    }

    /// Writes `lock` to the lock file of both roots.
    async fn write_lock(&self, lock: &LockInfo) -> Result<()> {
        let content = serde_json::to_string_pretty(lock)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        for path in self.lock_paths() {
            Self::write_atomic(&path, content.as_bytes()).await.map_err(|e| {
                SyncError::State(StateError::LockFailed {
                    message: e.to_string(),
                })
            })?;
        }
        Ok(())
    }

    /// Reads a lock file if it exists.
    async fn read_lock_file(path: &Path) -> Result<Option<LockInfo>> {
        if !path.exists() {
            return Ok(None);
        }

        let corrupted = |message: String| {
            SyncError::State(StateError::Corrupted {
                path: path.to_path_buf(),
                message,
            })
        };

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| corrupted(format!("Failed to read lock file: {e}")))?;

        let lock_info: LockInfo = serde_json::from_str(&content)
            .map_err(|e| corrupted(format!("Failed to parse lock file: {e}")))?;

        Ok(Some(lock_info))
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self, origin: Origin, resource_type: &str) -> Result<ResourceMap> {
        let path = self.file_path(origin, resource_type);
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(ResourceMap::new());
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            SyncError::State(StateError::Corrupted {
                path: path.clone(),
                message: format!("Failed to read state file: {e}"),
            })
        })?;

        if content.trim().is_empty() {
            return Ok(ResourceMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            SyncError::State(StateError::Corrupted {
                path,
                message: format!("Failed to parse state file: {e}"),
            })
        })
    }

    async fn save(&self, origin: Origin, resource_type: &str, resources: &ResourceMap) -> Result<()> {
        let path = self.file_path(origin, resource_type);

        let content = serde_json::to_string_pretty(resources).map_err(|e| {
            StateError::serialization(format!("Failed to serialize {origin} {resource_type}: {e}"))
        })?;

        Self::write_atomic(&path, content.as_bytes()).await?;
        debug!("Saved {} {origin} {resource_type} resources to {}", resources.len(), path.display());
        Ok(())
    }

    async fn exists(&self, origin: Origin, resource_type: &str) -> Result<bool> {
        Ok(self.file_path(origin, resource_type).exists())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        for path in self.lock_paths() {
            if let Some(existing) = Self::read_lock_file(&path).await? {
                if !existing.is_expired() {
                    return Err(SyncError::State(StateError::LockedByOther {
                        holder: existing.holder,
                        since: existing.acquired_at.to_rfc3339(),
                    }));
                }
                debug!("Expired lock found at {}, taking over", path.display());
            }
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id);
        self.write_lock(&lock_info).await?;

        info!(
            "Acquired state lock {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo> {
        for path in self.lock_paths() {
            if let Some(existing) = Self::read_lock_file(&path).await? {
                if existing.lock_id != lock.lock_id {
                    return Err(SyncError::State(StateError::LockedByOther {
                        holder: existing.holder,
                        since: existing.acquired_at.to_rfc3339(),
                    }));
                }
            }
        }

        let mut refreshed = lock.clone();
        refreshed.refresh();
        self.write_lock(&refreshed).await?;
        debug!("Refreshed state lock {} until {}", refreshed.lock_id, refreshed.expires_at.to_rfc3339());
        Ok(refreshed)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        for path in self.lock_paths() {
            match Self::read_lock_file(&path).await? {
                Some(existing) if existing.lock_id == lock_id => {
                    fs::remove_file(&path).await.map_err(|e| {
                        SyncError::State(StateError::LockFailed {
                            message: format!("Failed to delete lock file {}: {e}", path.display()),
                        })
                    })?;
                }
                Some(existing) => {
                    debug!("Lock ID mismatch at {}: expected {lock_id}, found {}", path.display(), existing.lock_id);
                }
                None => {}
            }
        }
        debug!("Released state lock {lock_id}");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
