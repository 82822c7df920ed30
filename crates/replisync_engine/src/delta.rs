//! Pull-side delta computation.

use crate::error::SyncResult;
use replisync_core::{Record, RecordStore, StoreView, Timestamp};
use replisync_protocol::{CollectionDelta, PullResponse};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Which list of a pull response a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaBucket {
    /// Created after the cursor and still live.
    Created,
    /// Created at or before the cursor, changed after it and still live.
    Updated,
    /// Deleted after the cursor.
    Deleted,
}

/// Classifies a record relative to a cursor.
///
/// Returns `None` if the client at `cursor` already has the record's
/// current state. The buckets are mutually exclusive: a tombstone is never
/// created or updated, and a record created after the cursor is never
/// updated.
pub fn classify(record: &Record, cursor: Timestamp) -> Option<DeltaBucket> {
    match record.deleted_at() {
        Some(deleted_at) if deleted_at > cursor => Some(DeltaBucket::Deleted),
        Some(_) => None,
        None if record.created_at() > cursor => Some(DeltaBucket::Created),
        None if record.updated_at() > cursor => Some(DeltaBucket::Updated),
        None => None,
    }
}

/// Computes pull deltas from a record store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaReader;

impl DeltaReader {
    /// Creates a delta reader.
    pub fn new() -> Self {
        Self
    }

    /// Computes the delta of every collection since `cursor` in one
    /// consistent read.
    pub fn compute_delta<S: RecordStore>(
        &self,
        store: &S,
        cursor: Timestamp,
    ) -> SyncResult<PullResponse> {
        let response = store.read(|view| self.read_delta(view, cursor))?;
        info!(
            cursor = cursor.as_millis(),
            timestamp = response.timestamp.as_millis(),
            changes = response.change_count(),
            "pull complete"
        );
        Ok(response)
    }

    /// Computes the delta against an open view.
    ///
    /// The returned timestamp is taken from the view after every collection
    /// has been read, so it is later than any change the delta contains.
    pub fn read_delta(&self, view: &dyn StoreView, cursor: Timestamp) -> SyncResult<PullResponse> {
        let schema = view.schema();
        let mut changes = BTreeMap::new();

        for name in schema.collection_names() {
            let mut delta = CollectionDelta::default();
            for record in view.changed_since(name, cursor)? {
                match classify(&record, cursor) {
                    Some(DeltaBucket::Created) => delta.created.push(record),
                    Some(DeltaBucket::Updated) => delta.updated.push(record),
                    Some(DeltaBucket::Deleted) => delta.deleted.push(record.id().clone()),
                    None => {}
                }
            }
            debug!(
                collection = name,
                created = delta.created.len(),
                updated = delta.updated.len(),
                deleted = delta.deleted.len(),
                "collection delta"
            );
            changes.insert(name.to_string(), delta);
        }

        Ok(PullResponse {
            changes,
            timestamp: view.now(),
        })
    }
}
