//! Push-side batch application.
//!
//! A batch may create records in several collections that reference each
//! other, possibly in cycles, so foreign keys cannot be written together with
//! the records that hold them. Every batch runs the same fixed phases inside
//! one write transaction:
//!
//! 1. **Bare creation**: every created record of every collection is
//!    inserted with its scalar fields only.
//! 2. **Linkage**: the foreign keys of the created records are resolved.
//!    Every record created by the batch exists by now, whatever the
//!    declaration order or cycle depth.
//! 3. **Updates**: partial updates of existing records.
//! 4. **Deletions**: records are turned into tombstones.
//! 5. **Link check**: a link set by this batch whose target the batch then
//!    deleted is cleared and reported, so no live record of the batch ends
//!    up pointing at a tombstone.
//!
//! Failures of single items are collected as [`ApplyError`]s and do not stop
//! their siblings; the rest of the batch commits. Only a store failure
//! aborts, rolling the whole batch back.

use crate::config::EngineConfig;
use crate::error::{ApplyError, SyncError, SyncResult};
use crate::validate::{link_target, PayloadValidator, SchemaValidator};
use replisync_core::{
    CollectionSchema, CoreError, CoreResult, RecordId, RecordPatch, RecordStore, Schema,
    StoreWriter,
};
use replisync_protocol::{ChangeSet, FieldChange, RecordPayload};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Applies client push batches to a record store.
#[derive(Clone)]
pub struct BatchApplier {
    config: EngineConfig,
    validator: Arc<dyn PayloadValidator>,
}

impl BatchApplier {
    /// Creates an applier that validates against the schema.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            validator: Arc::new(SchemaValidator),
        }
    }

    /// Replaces the payload validator.
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rejects batches that must not reach the store at all.
    pub fn check_batch(
        &self,
        schema: &Schema,
        changes: &BTreeMap<String, ChangeSet>,
    ) -> SyncResult<()> {
        if let Some(unknown) = changes.keys().find(|name| schema.collection(name).is_none()) {
            return Err(SyncError::malformed(format!("unknown collection: {unknown}")));
        }
        let items: usize = changes.values().map(ChangeSet::len).sum();
        if items > self.config.max_batch_items {
            return Err(SyncError::malformed(format!(
                "batch has {items} items, limit is {}",
                self.config.max_batch_items
            )));
        }
        Ok(())
    }

    /// Applies a batch and returns the items that failed.
    ///
    /// Returns `Err` only if the batch was rejected up front or the store
    /// failed; in the latter case nothing of the batch is persisted.
    pub fn apply_batch<S: RecordStore>(
        &self,
        store: &S,
        changes: &BTreeMap<String, ChangeSet>,
    ) -> SyncResult<Vec<ApplyError>> {
        let schema = store.schema();
        self.check_batch(&schema, changes)?;

        let result = store.write_transaction(|txn| {
            let mut batch = Batch {
                txn,
                schema: &schema,
                config: &self.config,
                validator: self.validator.as_ref(),
                errors: Vec::new(),
                linked: BTreeMap::new(),
            };
            let created = batch.create_bare(changes)?;
            batch.link_created(&created)?;
            batch.apply_updates(changes)?;
            batch.apply_deletions(changes)?;
            batch.verify_links()?;
            Ok::<_, SyncError>(batch.errors)
        });

        match result {
            Ok(errors) => {
                info!(
                    collections = changes.len(),
                    items = changes.values().map(ChangeSet::len).sum::<usize>(),
                    failed = errors.len(),
                    "push committed"
                );
                Ok(errors)
            }
            Err(err) => {
                error!(error = %err, "push rolled back");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for BatchApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchApplier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A created payload that made it through bare creation.
struct Created<'c> {
    collection: &'c str,
    payload: &'c RecordPayload,
}

/// A payload split along the collection's declarations.
struct Split<'p> {
    fields: BTreeMap<String, Value>,
    links: Vec<(&'p str, &'p FieldChange)>,
}

/// Owner of a link: collection, record ID and foreign-key field.
type LinkOwner = (String, RecordId, String);

/// State of one batch inside its write transaction.
struct Batch<'a> {
    txn: &'a mut dyn StoreWriter,
    schema: &'a Schema,
    config: &'a EngineConfig,
    validator: &'a dyn PayloadValidator,
    errors: Vec<ApplyError>,
    /// Links set by this batch, with the collection and ID they point at.
    linked: BTreeMap<LinkOwner, (String, RecordId)>,
}

impl Batch<'_> {
    fn reject(&mut self, err: ApplyError) {
        warn!(
            collection = %err.collection,
            id = %err.id,
            kind = %err.kind,
            message = %err.message,
            "push item rejected"
        );
        self.errors.push(err);
    }

    fn split<'p>(collection: &CollectionSchema, payload: &'p RecordPayload) -> Split<'p> {
        let mut split = Split {
            fields: BTreeMap::new(),
            links: Vec::new(),
        };
        for (name, change) in &payload.fields {
            if collection.scalar(name).is_some() {
                split.fields.insert(name.clone(), change.to_value());
            } else if collection.link(name).is_some() {
                split.links.push((name.as_str(), change));
            } else {
                debug!(
                    collection = collection.name(),
                    id = %payload.id,
                    field = %name,
                    "ignoring undeclared field"
                );
            }
        }
        split
    }

    /// Phase 1: inserts every created record without its foreign keys.
    fn create_bare<'c>(
        &mut self,
        changes: &'c BTreeMap<String, ChangeSet>,
    ) -> SyncResult<Vec<Created<'c>>> {
        let schema = self.schema;
        let mut created = Vec::new();
        for (name, set) in changes {
            let collection = schema.require(name)?;
            for payload in &set.created {
                if let Err(reason) = self.validator.validate_create(collection, payload) {
                    self.reject(ApplyError::validation(name, payload.id.clone(), reason));
                    continue;
                }
                let split = Self::split(collection, payload);
                if self.insert_or_replay(name, payload, split.fields)? {
                    created.push(Created {
                        collection: name,
                        payload,
                    });
                }
            }
        }
        debug!(created = created.len(), "bare creation done");
        Ok(created)
    }

    fn insert_or_replay(
        &mut self,
        collection: &str,
        payload: &RecordPayload,
        fields: BTreeMap<String, Value>,
    ) -> SyncResult<bool> {
        let id = &payload.id;
        let err = match item(self.txn.insert(collection, id.clone(), fields.clone()))? {
            Ok(_) => return Ok(true),
            Err(err) => err,
        };
        match err {
            CoreError::RecordExists { .. } if self.config.idempotent_creates => {
                let patch = RecordPatch {
                    fields,
                    links: BTreeMap::new(),
                };
                match item(self.txn.update(collection, id, &patch))? {
                    Ok(_) => {
                        debug!(collection, id = %id, "replayed create applied as update");
                        Ok(true)
                    }
                    Err(err) => {
                        self.reject(item_error(collection, id, err));
                        Ok(false)
                    }
                }
            }
            CoreError::RecordExists { .. } => {
                self.reject(ApplyError::validation(
                    collection,
                    id.clone(),
                    "record already exists",
                ));
                Ok(false)
            }
            other => {
                self.reject(item_error(collection, id, other));
                Ok(false)
            }
        }
    }

    /// Phase 2: resolves the foreign keys of the records created in phase 1.
    fn link_created(&mut self, created: &[Created<'_>]) -> SyncResult<()> {
        let schema = self.schema;
        let mut linked = 0usize;
        for entry in created {
            let collection = schema.require(entry.collection)?;
            let split = Self::split(collection, entry.payload);
            if split.links.is_empty() {
                continue;
            }
            let id = &entry.payload.id;

            match self.txn.get(entry.collection, id)? {
                Some(owner) if owner.is_live() => {}
                _ => {
                    self.reject(ApplyError::linkage(
                        entry.collection,
                        id.clone(),
                        "record to link was not found",
                    ));
                    continue;
                }
            }

            let mut patch = RecordPatch::new();
            for (field, change) in split.links {
                match self.resolve_link(collection, field, change)? {
                    Ok(target) => {
                        patch.links.insert(field.to_string(), target);
                    }
                    Err(reason) => {
                        self.reject(ApplyError::linkage(entry.collection, id.clone(), reason));
                    }
                }
            }
            if patch.is_empty() {
                continue;
            }
            match item(self.txn.update(entry.collection, id, &patch))? {
                Ok(_) => {
                    self.remember_links(collection, id, &patch);
                    linked += 1;
                }
                Err(err) => {
                    let reason = err.to_string();
                    self.reject(ApplyError::linkage(entry.collection, id.clone(), reason));
                }
            }
        }
        debug!(linked, "linkage done");
        Ok(())
    }

    /// Resolves one foreign-key change to the value to store.
    ///
    /// The outer `Result` carries store failures, the inner one a reason the
    /// link cannot be set.
    fn resolve_link(
        &self,
        collection: &CollectionSchema,
        field: &str,
        change: &FieldChange,
    ) -> SyncResult<Result<Option<RecordId>, String>> {
        let Some(fk) = collection.link(field) else {
            return Ok(Err(format!("{field}: not a foreign key")));
        };
        let target = match link_target(change) {
            Ok(Some(target)) => target,
            Ok(None) => return Ok(Ok(None)),
            Err(reason) => return Ok(Err(format!("{field}: {reason}"))),
        };
        match self.txn.get(&fk.target, &target)? {
            Some(record) if record.is_live() => Ok(Ok(Some(target))),
            Some(_) => Ok(Err(format!(
                "{field}: referenced {} record {target} was deleted",
                fk.target
            ))),
            None => Ok(Err(format!(
                "{field}: referenced {} record {target} does not exist",
                fk.target
            ))),
        }
    }

    /// Phase 3: applies partial updates.
    fn apply_updates(&mut self, changes: &BTreeMap<String, ChangeSet>) -> SyncResult<()> {
        let schema = self.schema;
        let mut updated = 0usize;
        for (name, set) in changes {
            let collection = schema.require(name)?;
            for payload in &set.updated {
                if self.apply_update(name, collection, payload)? {
                    updated += 1;
                }
            }
        }
        debug!(updated, "updates done");
        Ok(())
    }

    fn apply_update(
        &mut self,
        name: &str,
        collection: &CollectionSchema,
        payload: &RecordPayload,
    ) -> SyncResult<bool> {
        let id = &payload.id;
        if let Err(reason) = self.validator.validate_update(collection, payload) {
            self.reject(ApplyError::validation(name, id.clone(), reason));
            return Ok(false);
        }
        match self.txn.get(name, id)? {
            Some(existing) if existing.is_live() => {}
            Some(_) => {
                self.reject(ApplyError::not_found(name, id.clone(), "record was deleted"));
                return Ok(false);
            }
            None => {
                self.reject(ApplyError::not_found(name, id.clone(), "record does not exist"));
                return Ok(false);
            }
        }

        let split = Self::split(collection, payload);
        let mut patch = RecordPatch {
            fields: split.fields,
            links: BTreeMap::new(),
        };
        for (field, change) in split.links {
            match self.resolve_link(collection, field, change)? {
                Ok(target) => {
                    patch.links.insert(field.to_string(), target);
                }
                Err(reason) => {
                    self.reject(ApplyError::not_found(name, id.clone(), reason));
                    return Ok(false);
                }
            }
        }
        if patch.is_empty() {
            return Ok(false);
        }

        match item(self.txn.update(name, id, &patch))? {
            Ok(_) => {
                self.remember_links(collection, id, &patch);
                Ok(true)
            }
            Err(err) => {
                self.reject(item_error(name, id, err));
                Ok(false)
            }
        }
    }

    /// Phase 4: turns deleted records into tombstones.
    fn apply_deletions(&mut self, changes: &BTreeMap<String, ChangeSet>) -> SyncResult<()> {
        let mut deleted = 0usize;
        for (name, set) in changes {
            for id in &set.deleted {
                if self.txn.get(name, id)?.is_none() {
                    self.reject(ApplyError::not_found(name, id.clone(), "record does not exist"));
                    continue;
                }
                match item(self.txn.mark_deleted(name, id))? {
                    Ok(_) => deleted += 1,
                    Err(err) => self.reject(item_error(name, id, err)),
                }
            }
        }
        debug!(deleted, "deletions done");
        Ok(())
    }

    fn remember_links(
        &mut self,
        collection: &CollectionSchema,
        id: &RecordId,
        patch: &RecordPatch,
    ) {
        for (field, target) in &patch.links {
            let owner = (collection.name().to_string(), id.clone(), field.clone());
            match (collection.link(field), target) {
                (Some(fk), Some(target)) => {
                    self.linked.insert(owner, (fk.target.clone(), target.clone()));
                }
                _ => {
                    self.linked.remove(&owner);
                }
            }
        }
    }

    /// Phase 5: clears links whose target was deleted later in the batch.
    fn verify_links(&mut self) -> SyncResult<()> {
        let linked = std::mem::take(&mut self.linked);
        let mut cleared = 0usize;
        for ((collection, id, field), (target, target_id)) in linked {
            if matches!(self.txn.get(&target, &target_id)?, Some(record) if record.is_live()) {
                continue;
            }
            match self.txn.get(&collection, &id)? {
                Some(owner) if owner.is_live() && owner.link(&field) == Some(&target_id) => {}
                _ => continue,
            }
            let patch = RecordPatch::new().set_link(field.as_str(), None);
            match item(self.txn.update(&collection, &id, &patch))? {
                Ok(_) => cleared += 1,
                Err(err) => {
                    self.reject(item_error(&collection, &id, err));
                    continue;
                }
            }
            self.reject(ApplyError::linkage(
                collection.as_str(),
                id,
                format!("{field}: referenced {target} record {target_id} was deleted"),
            ));
        }
        debug!(cleared, "link check done");
        Ok(())
    }
}

/// Separates item-level store errors from failures that abort the batch.
fn item<T>(result: CoreResult<T>) -> SyncResult<Result<T, CoreError>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) if err.is_record_scoped() => Ok(Err(err)),
        Err(err) => Err(SyncError::from(err)),
    }
}

fn item_error(collection: &str, id: &RecordId, err: CoreError) -> ApplyError {
    match err {
        CoreError::RecordNotFound { .. } => {
            ApplyError::not_found(collection, id.clone(), "record does not exist")
        }
        CoreError::Tombstoned { .. } => {
            ApplyError::not_found(collection, id.clone(), "record was deleted")
        }
        other => ApplyError::validation(collection, id.clone(), other.to_string()),
    }
}
