//! State locking.
//!
//! A lock file in each state root keeps two runs from writing the same state
//! files at once. A running command refreshes its lock every
//! [`LOCK_REFRESH_SECS`]; locks left behind by a crashed run expire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// How often a running command pushes its lock expiry back.
pub const LOCK_REFRESH_SECS: u64 = 60;

/// Information about a state lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock for `holder`.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Refreshes the lock expiry time.
    pub fn refresh(&mut self) {
        self.expires_at = Utc::now() + chrono::Duration::seconds(LOCK_EXPIRY_SECS);
    }
}

/// Generates a holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let suffix = &Uuid::new_v4().simple().to_string()[..8];

    format!("{host}-{}-{suffix}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_lock_is_live() {
        let lock = LockInfo::new("ci-runner");
        assert_eq!(lock.holder, "ci-runner");
        assert!(!lock.is_expired());
    }

    #[test]
    fn test_backdated_lock_expires() {
        let mut lock = LockInfo::new("ci-runner");
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(lock.is_expired());
    }

    #[test]
    fn test_refresh_revives_an_aged_lock() {
        let mut lock = LockInfo::new("ci-runner");
        let acquired_at = lock.acquired_at;
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);

        lock.refresh();

        assert!(!lock.is_expired());
        assert_eq!(lock.acquired_at, acquired_at);
    }

    #[test]
    fn test_holder_ids_are_unique_per_call() {
        let a = generate_holder_id();
        let b = generate_holder_id();
        assert_ne!(a, b);
        assert!(a.contains(&std::process::id().to_string()));
    }
}
