//! Protocol messages for pull and push.

use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::RecordPayload;
use replisync_core::{Record, RecordId, Timestamp};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::{Deserialize, Serialize as DeriveSerialize};
use std::collections::BTreeMap;

/// Parses a raw `last_pulled_at` value.
///
/// An empty value and the literal `null` (what clients send before their
/// first sync) mean "no cursor". Anything else must be a non-negative
/// integer number of milliseconds.
pub fn parse_cursor(raw: &str) -> ProtocolResult<Option<Timestamp>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(|millis| Some(Timestamp::from_millis(millis)))
        .map_err(|_| ProtocolError::MalformedCursor(raw.to_string()))
}

/// Pull request from a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullRequest {
    /// Timestamp returned by the client's previous pull; `None` requests a
    /// full snapshot.
    pub last_pulled_at: Option<Timestamp>,
}

impl PullRequest {
    /// Creates a pull request.
    pub fn new(last_pulled_at: Option<Timestamp>) -> Self {
        Self { last_pulled_at }
    }

    /// Creates a full snapshot pull request.
    pub fn full_snapshot() -> Self {
        Self::default()
    }

    /// Builds a pull request from an optional raw cursor value.
    pub fn from_query(raw: Option<&str>) -> ProtocolResult<Self> {
        let last_pulled_at = match raw {
            Some(raw) => parse_cursor(raw)?,
            None => None,
        };
        Ok(Self { last_pulled_at })
    }

    /// Returns the effective cursor, the epoch for a full snapshot.
    pub fn cursor(&self) -> Timestamp {
        self.last_pulled_at.unwrap_or(Timestamp::EPOCH)
    }
}

/// Changes of one collection since a cursor.
///
/// A record appears in at most one of the three lists.
#[derive(Debug, Clone, Default, PartialEq, DeriveSerialize)]
pub struct CollectionDelta {
    /// Live records created after the cursor.
    pub created: Vec<Record>,
    /// Live records created at or before the cursor and changed after it.
    pub updated: Vec<Record>,
    /// IDs of records deleted after the cursor.
    pub deleted: Vec<RecordId>,
}

impl CollectionDelta {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Returns the total number of entries.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Pull response from the server.
#[derive(Debug, Clone, Default, PartialEq, DeriveSerialize)]
pub struct PullResponse {
    /// Per-collection changes, keyed by collection name.
    pub changes: BTreeMap<String, CollectionDelta>,
    /// Server time of the read; the client's next cursor.
    pub timestamp: Timestamp,
}

impl PullResponse {
    /// Returns the delta of one collection.
    pub fn collection(&self, name: &str) -> Option<&CollectionDelta> {
        self.changes.get(name)
    }

    /// Returns the total number of entries across collections.
    pub fn change_count(&self) -> usize {
        self.changes.values().map(CollectionDelta::len).sum()
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

/// Client changes to one collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, DeriveSerialize)]
#[serde(default)]
pub struct ChangeSet {
    /// Records created on the client.
    pub created: Vec<RecordPayload>,
    /// Partial updates of existing records.
    pub updated: Vec<RecordPayload>,
    /// IDs of records deleted on the client.
    #[serde(deserialize_with = "crate::payload::deserialize_ids")]
    pub deleted: Vec<RecordId>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a created record.
    #[must_use]
    pub fn create(mut self, payload: RecordPayload) -> Self {
        self.created.push(payload);
        self
    }

    /// Adds an updated record.
    #[must_use]
    pub fn update(mut self, payload: RecordPayload) -> Self {
        self.updated.push(payload);
        self
    }

    /// Adds a deleted record ID.
    #[must_use]
    pub fn delete(mut self, id: impl Into<RecordId>) -> Self {
        self.deleted.push(id.into());
        self
    }

    /// Returns the number of items in the change set.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns true if the change set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Push request from a client: one batch spanning any number of collections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, DeriveSerialize)]
pub struct PushRequest {
    /// Per-collection changes, keyed by collection name.
    #[serde(default)]
    pub changes: BTreeMap<String, ChangeSet>,
}

impl PushRequest {
    /// Creates an empty push request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the change set of a collection.
    #[must_use]
    pub fn with_changes(mut self, collection: impl Into<String>, changes: ChangeSet) -> Self {
        self.changes.insert(collection.into(), changes);
        self
    }

    /// Returns the number of items across all collections.
    pub fn item_count(&self) -> usize {
        self.changes.values().map(ChangeSet::len).sum()
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::MalformedBody)
    }
}

/// Push response from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResponse {
    /// Every item was applied.
    Success,
    /// Some items failed; the rest of the batch was committed.
    Rejected {
        /// Human-readable description of each failed item.
        errors: Vec<String>,
    },
}

impl PushResponse {
    /// Builds a response from the list of item errors.
    pub fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            PushResponse::Success
        } else {
            PushResponse::Rejected { errors }
        }
    }

    /// Returns true if every item was applied.
    pub fn is_success(&self) -> bool {
        matches!(self, PushResponse::Success)
    }

    /// Returns the item errors.
    pub fn errors(&self) -> &[String] {
        match self {
            PushResponse::Success => &[],
            PushResponse::Rejected { errors } => errors,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

impl Serialize for PushResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            PushResponse::Success => map.serialize_entry("status", "success")?,
            PushResponse::Rejected { errors } => map.serialize_entry("errors", errors)?,
        }
        map.end()
    }
}
