//! Error types for the sync engine.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, state management, the Datadog API, resource types and
//! the apply phase.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Datadog API errors.
    #[error("API error: {0}")]
    Client(#[from] ClientError),

    /// Errors raised by a resource type implementation.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Errors raised by the apply phase as a whole.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A credential required by the command is missing.
    #[error("Missing credential: {name}")]
    MissingCredential {
        /// Name of the missing option.
        name: String,
    },

    /// A legacy resource type and its replacement were both selected.
    #[error("`{legacy}` and `{replacement}` should not be used together as it will cause duplication")]
    ConflictingResources {
        /// The deprecated resource type.
        legacy: String,
        /// The resource type that supersedes it.
        replacement: String,
    },

    /// A filter expression could not be parsed.
    #[error("Invalid filter '{expression}': {message}")]
    InvalidFilter {
        /// The raw filter expression.
        expression: String,
        /// What is wrong with it.
        message: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A state file exists but cannot be read or parsed.
    #[error("State file {path} is corrupted: {message}")]
    Corrupted {
        /// Path of the state file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// A state file could not be written.
    #[error("Failed to write state file {path}: {message}")]
    WriteFailed {
        /// Path of the state file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Datadog API errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with a failure status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The API asked us to slow down.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The credentials were rejected.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// Transport-level failure.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The request did not complete in time.
    #[error("Request timed out: {message}")]
    Timeout {
        /// Description of the request that timed out.
        message: String,
    },

    /// The response body was not what we expected.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised by resource type implementations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A body is missing a field the type relies on.
    #[error("{resource_type}: missing field '{field}'")]
    MissingField {
        /// Resource type.
        resource_type: String,
        /// The missing field.
        field: String,
    },

    /// A body or response has an unexpected shape.
    #[error("{resource_type}: {message}")]
    UnexpectedShape {
        /// Resource type.
        resource_type: String,
        /// Description of the problem.
        message: String,
    },

    /// The type does not support the requested operation.
    #[error("{resource_type} does not support {operation}")]
    Unsupported {
        /// Resource type.
        resource_type: String,
        /// Operation name.
        operation: String,
    },
}

/// Errors raised by the apply phase as a whole.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// References could not be resolved even after forcing missing dependencies.
    #[error("{count} resource(s) still have unresolved dependencies: {resources}")]
    UnresolvedDependencies {
        /// Number of affected resources.
        count: usize,
        /// Affected resources as `type/id`.
        resources: String,
    },

    /// The worker pool was shut down while work was pending.
    #[error("Worker pool closed")]
    WorkersClosed,
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Client(e) => e.status(),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(name: impl Into<String>) -> Self {
        Self::MissingCredential { name: name.into() }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ClientError {
    /// Creates an HTTP status error.
    #[must_use]
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if the request may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::AuthenticationFailed { .. } | Self::InvalidResponse { .. } => false,
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl ResourceError {
    /// Creates a missing field error.
    #[must_use]
    pub fn missing_field(resource_type: &str, field: &str) -> Self {
        Self::MissingField {
            resource_type: resource_type.to_string(),
            field: field.to_string(),
        }
    }

    /// Creates an unexpected shape error.
    #[must_use]
    pub fn unexpected(resource_type: &str, message: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            resource_type: resource_type.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::http(503, "unavailable").is_retryable());
        assert!(ClientError::network("reset").is_retryable());
        assert!(ClientError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(!ClientError::http(404, "not found").is_retryable());
        assert!(!ClientError::invalid_response("bad json").is_retryable());
    }

    #[test]
    fn test_http_status_passthrough() {
        let err = SyncError::from(ClientError::http(404, "gone"));
        assert_eq!(err.http_status(), Some(404));
        let err = SyncError::from(ApplyError::WorkersClosed);
        assert_eq!(err.http_status(), None);
    }
}
