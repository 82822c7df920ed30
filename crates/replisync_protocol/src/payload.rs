//! Client-submitted record payloads.

use replisync_core::RecordId;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys the server owns; values sent by clients are discarded.
const SERVER_MANAGED: [&str; 3] = ["created_at", "updated_at", "deleted_at"];

/// What a payload says about one field.
///
/// A field that is absent from the payload has no `FieldChange` at all and is
/// left untouched. `Clear` is an explicit JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Store this value.
    Set(Value),
    /// Store null (or unset a foreign key).
    Clear,
}

impl FieldChange {
    /// Converts the change into the value to store.
    pub fn into_value(self) -> Value {
        match self {
            FieldChange::Set(value) => value,
            FieldChange::Clear => Value::Null,
        }
    }

    /// Returns the value to store without consuming the change.
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }
}

impl From<Value> for FieldChange {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldChange::Clear,
            other => FieldChange::Set(other),
        }
    }
}

/// One record as sent by a client in the `created` or `updated` list.
///
/// On the wire this is a flat JSON object with an `id` and any subset of the
/// collection's fields. Server-managed timestamps and client-local metadata
/// keys (those starting with `_`, such as `_status` or `_changed`) are
/// dropped while decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPayload {
    /// Client-assigned record ID.
    pub id: RecordId,
    /// Fields present in the payload.
    pub fields: BTreeMap<String, FieldChange>,
}

impl RecordPayload {
    /// Creates a payload with no fields.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field. `null` becomes [`FieldChange::Clear`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), FieldChange::from(value));
        self
    }

    /// Returns the change for a field, if the payload mentions it.
    pub fn get(&self, name: &str) -> Option<&FieldChange> {
        self.fields.get(name)
    }
}

fn payload_id<E: serde::de::Error>(value: Option<Value>) -> Result<RecordId, E> {
    match value {
        Some(Value::String(id)) if !id.is_empty() => Ok(RecordId::new(id)),
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(RecordId::new(n.to_string())),
        Some(other) => Err(E::custom(format!("invalid record id: {other}"))),
        None => Err(E::custom("record payload is missing an id")),
    }
}

/// Decodes a list of record IDs with the same rules as a payload `id`.
pub(crate) fn deserialize_ids<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RecordId>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|value| payload_id::<D::Error>(Some(value)))
        .collect()
}

impl<'de> Deserialize<'de> for RecordPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut object = Map::<String, Value>::deserialize(deserializer)?;
        let id = payload_id::<D::Error>(object.remove("id"))?;

        let fields = object
            .into_iter()
            .filter(|(name, _)| !name.starts_with('_') && !SERVER_MANAGED.contains(&name.as_str()))
            .map(|(name, value)| (name, FieldChange::from(value)))
            .collect();

        Ok(Self { id, fields })
    }
}

impl Serialize for RecordPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (name, change) in &self.fields {
            map.serialize_entry(name, &change.to_value())?;
        }
        map.end()
    }
}
