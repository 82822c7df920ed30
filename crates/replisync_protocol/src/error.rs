//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding or encoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The pull cursor is not a non-negative millisecond timestamp.
    #[error("malformed cursor: {0:?}")]
    MalformedCursor(String),

    /// The request body is not a valid message.
    #[error("malformed body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::MalformedCursor("yesterday".into());
        assert_eq!(err.to_string(), "malformed cursor: \"yesterday\"");
    }
}
