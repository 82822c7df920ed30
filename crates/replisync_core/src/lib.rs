//! # Replisync Core
//!
//! Record model and storage abstraction for replisync.
//!
//! This crate provides:
//! - Server timestamps and strictly monotonic clocks
//! - Records with a `Live -> Deleted` tombstone lifecycle
//! - Collection schemas with nullable, possibly cyclic, foreign keys
//! - The [`RecordStore`] transaction abstraction
//! - An in-memory store with undo-log rollback
//!
//! ## Key Invariants
//!
//! - `created_at <= updated_at` for every record
//! - `deleted_at`, once set, is never unset or moved
//! - A tombstone's fields are frozen
//! - Every mutation refreshes `updated_at`, deletion included

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod clock;
mod error;
mod memory;
mod record;
mod schema;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use memory::MemoryStore;
pub use record::{Record, RecordPatch, RecordState};
pub use schema::{
    CollectionSchema, DependencyGraph, FieldDef, FieldKind, ForeignKey, Schema, RESERVED_FIELDS,
};
pub use store::{RecordStore, StoreView, StoreWriter};
pub use types::{RecordId, Timestamp};
