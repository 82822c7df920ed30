//! Error types for replisync core.

use crate::types::RecordId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record store and schema operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The collection is not declared by the schema.
    #[error("unknown collection: {name}")]
    UnknownCollection {
        /// Name of the collection.
        name: String,
    },

    /// The field is not declared by the collection schema.
    #[error("unknown field {field} in collection {collection}")]
    UnknownField {
        /// The collection searched.
        collection: String,
        /// The offending field name.
        field: String,
    },

    /// Record not found.
    #[error("record not found: {id} in collection {collection}")]
    RecordNotFound {
        /// The collection searched.
        collection: String,
        /// The record ID that was not found.
        id: RecordId,
    },

    /// A record with this ID already exists.
    #[error("record already exists: {id} in collection {collection}")]
    RecordExists {
        /// The collection written to.
        collection: String,
        /// The duplicate record ID.
        id: RecordId,
    },

    /// The record is tombstoned and can no longer be mutated.
    #[error("record {id} in collection {collection} is deleted")]
    Tombstoned {
        /// The collection of the record.
        collection: String,
        /// The tombstoned record ID.
        id: RecordId,
    },

    /// The schema definition is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// Failure inside the storage backend itself.
    #[error("storage backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a record not found error.
    pub fn not_found(collection: impl Into<String>, id: RecordId) -> Self {
        Self::RecordNotFound {
            collection: collection.into(),
            id,
        }
    }

    /// Creates a tombstoned record error.
    pub fn tombstoned(collection: impl Into<String>, id: RecordId) -> Self {
        Self::Tombstoned {
            collection: collection.into(),
            id,
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns true if the error concerns a single record and leaves the
    /// store itself healthy.
    ///
    /// Backend and schema failures are not record-scoped: a transaction that
    /// hits one must be aborted.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownField { .. }
                | CoreError::RecordNotFound { .. }
                | CoreError::RecordExists { .. }
                | CoreError::Tombstoned { .. }
        )
    }
}
