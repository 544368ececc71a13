//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.
//!
//! Construction-time failures (`UnknownDriver`, `Connection`) abort only the
//! current initialization attempt. Per-record failures (`NotFound`,
//! `AlreadyExists`) are always returned to the caller.

use thiserror::Error;

/// Errors from driver selection and release storage operations.
///
/// `Clone` so a failed cluster client construction can be cached and
/// handed to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Driver kind string not in the dispatch table
    #[error("unknown driver {kind:?}")]
    UnknownDriver {
        /// The offending kind string
        kind: String,
    },

    /// SQL connection could not be established or validated
    #[error("connection error: {message}")]
    Connection {
        /// Connection error message
        message: String,
    },

    /// Cluster client factory failed
    #[error("cluster client error: {message}")]
    ClusterClient {
        /// Factory error message
        message: String,
    },

    /// Release not found
    #[error("release: not found: {key}")]
    NotFound {
        /// Storage key that was not found
        key: String,
    },

    /// Release already exists
    #[error("release: already exists: {key}")]
    AlreadyExists {
        /// Storage key that already exists
        key: String,
    },

    /// Invalid release or filter
    #[error("validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Release could not be encoded or decoded
    #[error("serialization error: {message}")]
    Serialization {
        /// Codec error message
        message: String,
    },

    /// Backend query failed
    #[error("query error: {message}")]
    Query {
        /// Query error message
        message: String,
    },

    /// Operation exceeded its deadline
    #[error("timeout after {duration_ms}ms")]
    Timeout {
        /// Duration in milliseconds
        duration_ms: u64,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl StorageError {
    /// Create an unknown driver error.
    #[must_use]
    pub fn unknown_driver(kind: impl Into<String>) -> Self {
        Self::UnknownDriver { kind: kind.into() }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a cluster client error.
    #[must_use]
    pub fn cluster_client(message: impl Into<String>) -> Self {
        Self::ClusterClient {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already exists error.
    #[must_use]
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a transient error (can be retried).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::ClusterClient { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
