//! The record store abstraction.
//!
//! The sync engine never touches storage directly. It reads through a
//! [`StoreView`] and writes through a [`StoreWriter`], both obtained from a
//! [`RecordStore`] that owns isolation:
//!
//! - a `read` closure observes a single consistent state, never half of a
//!   concurrently committing write transaction
//! - a `write_transaction` closure is all-or-nothing; returning `Err` (or
//!   unwinding) discards every mutation made inside it
//!
//! Timestamps are assigned by the store from its clock, so `created_at`,
//! `updated_at` and `deleted_at` are server time regardless of what a client
//! sends.

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordPatch};
use crate::schema::Schema;
use crate::types::{RecordId, Timestamp};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read access to a consistent store state.
pub trait StoreView {
    /// Returns the schema the store was opened with.
    fn schema(&self) -> Arc<Schema>;

    /// Returns the current server time.
    ///
    /// Called inside a read, the result is strictly greater than the
    /// timestamp of every mutation visible to that read.
    fn now(&self) -> Timestamp;

    /// Fetches a record, live or tombstoned.
    fn get(&self, collection: &str, id: &RecordId) -> CoreResult<Option<Record>>;

    /// Returns every record of `collection` whose `updated_at` is after
    /// `since`, ordered by `(created_at, id)`.
    ///
    /// Because creation and deletion both refresh `updated_at`, this covers
    /// everything created, updated or deleted after `since`.
    fn changed_since(&self, collection: &str, since: Timestamp) -> CoreResult<Vec<Record>>;

    /// Fetches a record and fails unless it exists and is live.
    fn get_live(&self, collection: &str, id: &RecordId) -> CoreResult<Record> {
        match self.get(collection, id)? {
            Some(record) if record.is_live() => Ok(record),
            Some(_) => Err(CoreError::tombstoned(collection, id.clone())),
            None => Err(CoreError::not_found(collection, id.clone())),
        }
    }
}

/// Write access inside a transaction.
pub trait StoreWriter: StoreView {
    /// Inserts a new live record with the given scalar fields.
    ///
    /// Fails with `RecordExists` if the ID is taken in that collection,
    /// live or tombstoned.
    fn insert(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<Record>;

    /// Applies a partial mutation to a live record.
    fn update(&mut self, collection: &str, id: &RecordId, patch: &RecordPatch)
        -> CoreResult<Record>;

    /// Soft-deletes a record.
    ///
    /// Deleting a tombstone is a no-op that returns it unchanged.
    fn mark_deleted(&mut self, collection: &str, id: &RecordId) -> CoreResult<Record>;
}

/// A transactional collection of records.
pub trait RecordStore: Send + Sync {
    /// Returns the schema the store was opened with, without reading data.
    fn schema(&self) -> Arc<Schema>;

    /// Runs `f` against a consistent snapshot.
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreView) -> Result<T, E>,
        E: From<CoreError>;

    /// Runs `f` inside a write transaction.
    ///
    /// If `f` returns `Ok` the transaction is committed. If it returns `Err`
    /// the transaction is rolled back and the error is returned.
    fn write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWriter) -> Result<T, E>,
        E: From<CoreError>;
}
