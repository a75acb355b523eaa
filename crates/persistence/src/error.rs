//! Error types for the storage and search engine.
//!
//! The variants mirror the seven error kinds the HTTP layer is expected to
//! map onto status codes: not-found, conflict, invalid-input,
//! invalid-reference, unsupported-parameter, format, and internal.

use thiserror::Error;

/// Convenience alias used throughout this crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A resource, resource version, or history entry was not found.
    #[error("not found: {resource_type}/{id}{}", .version.map(|v| format!("/_history/{v}")).unwrap_or_default())]
    NotFound {
        /// Resource type being looked up.
        resource_type: String,
        /// Resource id being looked up.
        id: String,
        /// Specific version requested, if any.
        version: Option<u64>,
    },

    /// A POST supplied an id that already has a live row.
    #[error("conflict: {resource_type}/{id} already exists")]
    Conflict {
        /// Resource type of the collision.
        resource_type: String,
        /// Id of the collision.
        id: String,
    },

    /// The request body or path was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A reference embedded in the resource does not resolve to a live row.
    #[error("invalid reference: {reference} does not resolve to a live resource")]
    InvalidReference {
        /// The raw `"Type/id"` reference string that failed to resolve.
        reference: String,
    },

    /// A search control parameter outside the supported whitelist.
    #[error("unsupported search parameter: {0}")]
    UnsupportedParameter(String),

    /// A value could not be coerced into its target column type.
    #[error("format error: {0}")]
    Format(String),

    /// A database error, compensation failure, or other unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Builds a [`StoreError::NotFound`] for a current-row lookup.
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Builds a [`StoreError::NotFound`] for a specific history version.
    pub fn version_not_found(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version: u64,
    ) -> Self {
        StoreError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
            version: Some(version),
        }
    }

    /// True if this error kind should trigger rollback compensation on the
    /// write path (every kind except a plain not-found on the happy read
    /// path, which callers handle separately).
    pub fn is_internal(&self) -> bool {
        matches!(self, StoreError::Internal(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Internal(format!("sqlite error: {e}"))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Internal(format!("postgres error: {e}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidInput(format!("invalid JSON: {e}"))
    }
}
