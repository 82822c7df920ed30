//! In-memory record store.

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordPatch};
use crate::schema::Schema;
use crate::store::{RecordStore, StoreView, StoreWriter};
use crate::types::{RecordId, Timestamp};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type Table = BTreeMap<RecordId, Record>;
type Tables = BTreeMap<String, Table>;

/// A record store that keeps every collection in memory.
///
/// This store is suitable for:
/// - Unit and integration tests
/// - Servers whose replicas can be rebuilt from scratch
///
/// # Isolation
///
/// Readers share a read lock. A write transaction holds the write lock for
/// its whole lifetime, so a pull observes either all or none of a push.
/// Every mutation inside a transaction records the previous version of the
/// record in an undo log; the log is replayed when the transaction returns
/// `Err` or unwinds.
///
/// # Example
///
/// ```rust
/// use replisync_core::{CollectionSchema, FieldDef, MemoryStore, RecordId, RecordStore, Schema};
/// use replisync_core::{CoreError, StoreView, StoreWriter};
/// use std::collections::BTreeMap;
///
/// let schema = Schema::new().with_collection(
///     CollectionSchema::new("tasks").field(FieldDef::text("title")),
/// );
/// let store = MemoryStore::new(schema).unwrap();
///
/// store
///     .write_transaction(|txn| {
///         txn.insert("tasks", RecordId::new("T1"), BTreeMap::new())?;
///         Ok::<_, CoreError>(())
///     })
///     .unwrap();
///
/// let found = store
///     .read(|view| view.get("tasks", &RecordId::new("T1")))
///     .unwrap();
/// assert!(found.is_some());
/// ```
pub struct MemoryStore {
    schema: Arc<Schema>,
    clock: Arc<dyn Clock>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store stamped by the system clock.
    pub fn new(schema: Schema) -> CoreResult<Self> {
        Self::with_clock(schema, Arc::new(SystemClock::new()))
    }

    /// Creates an empty store stamped by the given clock.
    pub fn with_clock(schema: Schema, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        schema.validate()?;

        let cyclic = schema.dependency_graph().cyclic_collections();
        if !cyclic.is_empty() {
            debug!(collections = ?cyclic, "schema has cyclic foreign keys");
        }

        let tables = schema
            .collection_names()
            .map(|name| (name.to_string(), Table::new()))
            .collect();

        Ok(Self {
            schema: Arc::new(schema),
            clock,
            tables: RwLock::new(tables),
        })
    }

    /// Returns the number of records (live and tombstoned) in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.tables.read().get(collection).map_or(0, Table::len)
    }

    /// Returns the total number of records across all collections.
    pub fn total_count(&self) -> usize {
        self.tables.read().values().map(Table::len).sum()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("total_count", &self.total_count())
            .finish_non_exhaustive()
    }
}

impl RecordStore for MemoryStore {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreView) -> Result<T, E>,
        E: From<CoreError>,
    {
        let tables = self.tables.read();
        let snapshot = Snapshot {
            schema: &self.schema,
            clock: self.clock.as_ref(),
            tables: &*tables,
        };
        f(&snapshot)
    }

    fn write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWriter) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut tables = self.tables.write();
        let mut txn = MemoryTransaction {
            schema: &self.schema,
            clock: self.clock.as_ref(),
            tables: &mut *tables,
            undo: Vec::new(),
            committed: false,
        };
        let result = f(&mut txn);
        if result.is_ok() {
            txn.committed = true;
        }
        result
    }
}

fn table<'t>(tables: &'t Tables, collection: &str) -> CoreResult<&'t Table> {
    tables
        .get(collection)
        .ok_or_else(|| CoreError::UnknownCollection {
            name: collection.to_string(),
        })
}

fn table_mut<'t>(tables: &'t mut Tables, collection: &str) -> CoreResult<&'t mut Table> {
    tables
        .get_mut(collection)
        .ok_or_else(|| CoreError::UnknownCollection {
            name: collection.to_string(),
        })
}

fn changed_since(tables: &Tables, collection: &str, since: Timestamp) -> CoreResult<Vec<Record>> {
    let mut records: Vec<Record> = table(tables, collection)?
        .values()
        .filter(|r| r.updated_at() > since)
        .cloned()
        .collect();
    records.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    Ok(records)
}

struct Snapshot<'a> {
    schema: &'a Arc<Schema>,
    clock: &'a dyn Clock,
    tables: &'a Tables,
}

impl StoreView for Snapshot<'_> {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(self.schema)
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn get(&self, collection: &str, id: &RecordId) -> CoreResult<Option<Record>> {
        Ok(table(self.tables, collection)?.get(id).cloned())
    }

    fn changed_since(&self, collection: &str, since: Timestamp) -> CoreResult<Vec<Record>> {
        changed_since(self.tables, collection, since)
    }
}

/// Previous version of a record touched by the running transaction.
struct UndoEntry {
    collection: String,
    id: RecordId,
    previous: Option<Record>,
}

struct MemoryTransaction<'a> {
    schema: &'a Arc<Schema>,
    clock: &'a dyn Clock,
    tables: &'a mut Tables,
    undo: Vec<UndoEntry>,
    committed: bool,
}

impl MemoryTransaction<'_> {
    fn remember(&mut self, collection: &str, id: &RecordId, previous: Option<Record>) {
        self.undo.push(UndoEntry {
            collection: collection.to_string(),
            id: id.clone(),
            previous,
        });
    }

    fn rollback(&mut self) {
        debug!(mutations = self.undo.len(), "rolling back write transaction");
        while let Some(entry) = self.undo.pop() {
            let Some(table) = self.tables.get_mut(&entry.collection) else {
                continue;
            };
            match entry.previous {
                Some(record) => {
                    table.insert(entry.id, record);
                }
                None => {
                    table.remove(&entry.id);
                }
            }
        }
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl StoreView for MemoryTransaction<'_> {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(self.schema)
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn get(&self, collection: &str, id: &RecordId) -> CoreResult<Option<Record>> {
        Ok(table(&*self.tables, collection)?.get(id).cloned())
    }

    fn changed_since(&self, collection: &str, since: Timestamp) -> CoreResult<Vec<Record>> {
        changed_since(&*self.tables, collection, since)
    }
}

impl StoreWriter for MemoryTransaction<'_> {
    fn insert(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<Record> {
        let schema = self.schema.require(collection)?;
        if table(&*self.tables, collection)?.contains_key(&id) {
            return Err(CoreError::RecordExists {
                collection: collection.to_string(),
                id,
            });
        }

        let record = Record::new(schema, id.clone(), fields, self.clock.now())?;
        table_mut(self.tables, collection)?.insert(id.clone(), record.clone());
        self.remember(collection, &id, None);
        Ok(record)
    }

    fn update(
        &mut self,
        collection: &str,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> CoreResult<Record> {
        let now = self.clock.now();
        let record = table_mut(self.tables, collection)?
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found(collection, id.clone()))?;

        let previous = record.clone();
        record.apply_patch(collection, patch, now)?;
        let updated = record.clone();
        self.remember(collection, id, Some(previous));
        Ok(updated)
    }

    fn mark_deleted(&mut self, collection: &str, id: &RecordId) -> CoreResult<Record> {
        let now = self.clock.now();
        let record = table_mut(self.tables, collection)?
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found(collection, id.clone()))?;

        let previous = record.clone();
        if record.tombstone(now) {
            let deleted = record.clone();
            self.remember(collection, id, Some(previous));
            Ok(deleted)
        } else {
            Ok(previous)
        }
    }
}
