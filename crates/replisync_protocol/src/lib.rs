//! # Replisync Protocol
//!
//! Wire types for the replisync pull/push protocol.
//!
//! This crate provides:
//! - `PullRequest` / `PullResponse` with per-collection deltas
//! - `PushRequest` / `PushResponse` for client batches
//! - `RecordPayload` with an explicit omitted/null distinction per field
//! - JSON encoding and decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod error;
mod messages;
mod payload;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    parse_cursor, ChangeSet, CollectionDelta, PullRequest, PullResponse, PushRequest, PushResponse,
};
pub use payload::{FieldChange, RecordPayload};
