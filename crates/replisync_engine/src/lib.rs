//! # Replisync Engine
//!
//! Server-side synchronization engine for replisync.
//!
//! This crate provides:
//! - The delta reader: per-collection created/updated/deleted lists since a
//!   client cursor
//! - The batch applier: multi-collection pushes with foreign keys in any
//!   order, cycles included
//! - Payload validation behind a pluggable trait
//! - The sync coordinator tying both to a record store
//!
//! ## Key Invariants
//!
//! - A record appears in at most one list of a pull response
//! - A pull sees all or none of a push
//! - Bare creation of every collection precedes linkage of any collection
//! - Per-item failures never stop sibling items; store failures roll the
//!   whole batch back
//! - Tombstones are never resurrected or modified

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod applier;
mod config;
mod coordinator;
mod delta;
mod error;
mod validate;

pub use applier::BatchApplier;
pub use config::{EngineConfig, DEFAULT_MAX_BATCH_ITEMS};
pub use coordinator::SyncCoordinator;
pub use delta::{classify, DeltaBucket, DeltaReader};
pub use error::{ApplyError, ApplyErrorKind, SyncError, SyncResult};
pub use validate::{PayloadValidator, SchemaValidator};
