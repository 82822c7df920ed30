//! Error types for the sync engine.

use replisync_core::{CoreError, RecordId};
use replisync_protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a whole pull or push.
///
/// Per-item push failures are not errors at this level; they are collected
/// as [`ApplyError`]s and the batch still commits.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request was rejected before any store access.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The store failed; the enclosing transaction was rolled back.
    #[error("store failure: {0}")]
    Store(#[source] CoreError),

    /// The store's schema is unusable.
    #[error("schema error: {0}")]
    Schema(String),
}

impl SyncError {
    /// Creates a malformed request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Returns true if the caller sent a bad request.
    pub fn is_malformed(&self) -> bool {
        matches!(self, SyncError::Malformed(_))
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidSchema { message } => SyncError::Schema(message),
            other => SyncError::Store(other),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Malformed(err.to_string())
    }
}

/// Category of a per-item push failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyErrorKind {
    /// The payload failed field checks.
    Validation,
    /// The record to update or delete, or a referenced record, does not
    /// exist or is a tombstone.
    NotFound,
    /// A foreign key of a created record could not be resolved.
    Linkage,
}

impl fmt::Display for ApplyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyErrorKind::Validation => "validation",
            ApplyErrorKind::NotFound => "not found",
            ApplyErrorKind::Linkage => "linkage",
        };
        f.write_str(name)
    }
}

/// A push item that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    /// Failure category.
    pub kind: ApplyErrorKind,
    /// Collection of the offending item.
    pub collection: String,
    /// ID of the offending item.
    pub id: RecordId,
    /// Human-readable reason.
    pub message: String,
}

impl ApplyError {
    /// Creates an error of the given kind.
    pub fn new(
        kind: ApplyErrorKind,
        collection: impl Into<String>,
        id: RecordId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            id,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(collection: impl Into<String>, id: RecordId, message: impl Into<String>) -> Self {
        Self::new(ApplyErrorKind::Validation, collection, id, message)
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, id: RecordId, message: impl Into<String>) -> Self {
        Self::new(ApplyErrorKind::NotFound, collection, id, message)
    }

    /// Creates a linkage error.
    pub fn linkage(collection: impl Into<String>, id: RecordId, message: impl Into<String>) -> Self {
        Self::new(ApplyErrorKind::Linkage, collection, id, message)
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.collection, self.id, self.message)
    }
}

impl std::error::Error for ApplyError {}
