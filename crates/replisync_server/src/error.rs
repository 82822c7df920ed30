//! Error types for the sync server.

use replisync_engine::SyncError;
use replisync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request body exceeds the configured limit.
    #[error("request body of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge {
        /// Size of the body.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// No endpoint at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The endpoint does not accept this method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::PayloadTooLarge { .. }
                | ServerError::NotFound(_)
                | ServerError::MethodNotAllowed(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Store(_) | ServerError::Internal(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::Store(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns the message shown to the client. Server-side details are not
    /// disclosed.
    pub fn public_message(&self) -> String {
        if self.is_server_error() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<SyncError> for ServerError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Malformed(message) => ServerError::InvalidRequest(message),
            SyncError::Store(source) => ServerError::Store(source.to_string()),
            SyncError::Schema(message) => ServerError::Internal(message),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Encode(source) => ServerError::Internal(source.to_string()),
            other => ServerError::InvalidRequest(other.to_string()),
        }
    }
}
