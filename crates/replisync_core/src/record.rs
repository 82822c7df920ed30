//! Records and their tombstone lifecycle.

use crate::error::{CoreError, CoreResult};
use crate::schema::CollectionSchema;
use crate::types::{RecordId, Timestamp};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifecycle state of a record.
///
/// The only transition is `Live -> Deleted`. A deleted record is a
/// tombstone: it is kept so that its ID can be handed to replicas that still
/// hold it, and its fields are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// The record is visible.
    Live,
    /// The record was soft-deleted at the given time.
    Deleted {
        /// Time of deletion.
        at: Timestamp,
    },
}

impl RecordState {
    /// Returns true if the record is live.
    pub fn is_live(&self) -> bool {
        matches!(self, RecordState::Live)
    }

    /// Returns the deletion time, if any.
    pub fn deleted_at(&self) -> Option<Timestamp> {
        match self {
            RecordState::Live => None,
            RecordState::Deleted { at } => Some(*at),
        }
    }
}

/// A partial mutation of a record.
///
/// Only keys present in the maps are touched. For foreign keys, `None`
/// explicitly clears the reference, which is distinct from leaving the key
/// out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    /// Scalar fields to overwrite. `Value::Null` stores null.
    pub fields: BTreeMap<String, Value>,
    /// Foreign keys to set (`Some`) or clear (`None`).
    pub links: BTreeMap<String, Option<RecordId>>,
}

impl RecordPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a scalar field.
    #[must_use]
    pub fn set_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Sets or clears a foreign key.
    #[must_use]
    pub fn set_link(mut self, name: impl Into<String>, target: Option<RecordId>) -> Self {
        self.links.insert(name.into(), target);
        self
    }

    /// Returns true if the patch touches nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.links.is_empty()
    }
}

/// A stored record of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: BTreeMap<String, Value>,
    links: BTreeMap<String, Option<RecordId>>,
    created_at: Timestamp,
    updated_at: Timestamp,
    state: RecordState,
}

impl Record {
    /// Creates a live record with every declared field present.
    ///
    /// Declared fields that are missing from `fields` are stored as null and
    /// every foreign key starts unset.
    pub fn new(
        schema: &CollectionSchema,
        id: RecordId,
        mut fields: BTreeMap<String, Value>,
        now: Timestamp,
    ) -> CoreResult<Self> {
        if let Some(unknown) = fields.keys().find(|name| schema.scalar(name).is_none()) {
            return Err(CoreError::UnknownField {
                collection: schema.name().to_string(),
                field: unknown.clone(),
            });
        }
        for def in schema.fields() {
            fields.entry(def.name.clone()).or_insert(Value::Null);
        }
        let links = schema
            .foreign_keys()
            .iter()
            .map(|fk| (fk.field.clone(), None))
            .collect();

        Ok(Self {
            id,
            fields,
            links,
            created_at: now,
            updated_at: now,
            state: RecordState::Live,
        })
    }

    /// Returns the record ID.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns a scalar field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns all scalar fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns the target of a foreign key, `None` when unset or unknown.
    pub fn link(&self, name: &str) -> Option<&RecordId> {
        self.links.get(name).and_then(Option::as_ref)
    }

    /// Returns all foreign keys.
    pub fn links(&self) -> &BTreeMap<String, Option<RecordId>> {
        &self.links
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the time of the last mutation (including deletion).
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the deletion time of a tombstone.
    pub fn deleted_at(&self) -> Option<Timestamp> {
        self.state.deleted_at()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Returns true if the record has not been deleted.
    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Applies a partial mutation and refreshes `updated_at`.
    ///
    /// Fails with `Tombstoned` on a deleted record and with `UnknownField`
    /// if the patch names something the record does not have; in both cases
    /// the record is left untouched.
    pub fn apply_patch(
        &mut self,
        collection: &str,
        patch: &RecordPatch,
        now: Timestamp,
    ) -> CoreResult<()> {
        if !self.is_live() {
            return Err(CoreError::tombstoned(collection, self.id.clone()));
        }
        let unknown = patch
            .fields
            .keys()
            .find(|name| !self.fields.contains_key(*name))
            .or_else(|| patch.links.keys().find(|name| !self.links.contains_key(*name)));
        if let Some(field) = unknown {
            return Err(CoreError::UnknownField {
                collection: collection.to_string(),
                field: field.clone(),
            });
        }

        for (name, value) in &patch.fields {
            self.fields.insert(name.clone(), value.clone());
        }
        for (name, target) in &patch.links {
            self.links.insert(name.clone(), target.clone());
        }
        self.touch(now);
        Ok(())
    }

    /// Turns the record into a tombstone.
    ///
    /// Returns `false` without changing anything if the record already is
    /// one: deletion is terminal and the first `deleted_at` is kept.
    pub fn tombstone(&mut self, now: Timestamp) -> bool {
        if !self.is_live() {
            return false;
        }
        self.touch(now);
        self.state = RecordState::Deleted {
            at: self.updated_at,
        };
        true
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now.max(self.updated_at);
    }
}

/// Serializes the wire form of a record: `id`, every scalar and foreign-key
/// field, `created_at` and `updated_at`. `deleted_at` only appears on
/// tombstones.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = if self.is_live() { 3 } else { 4 };
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.links.len() + extra))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        for (name, target) in &self.links {
            map.serialize_entry(name, target)?;
        }
        map.serialize_entry("created_at", &self.created_at)?;
        map.serialize_entry("updated_at", &self.updated_at)?;
        if let Some(deleted_at) = self.deleted_at() {
            map.serialize_entry("deleted_at", &deleted_at)?;
        }
        map.end()
    }
}
