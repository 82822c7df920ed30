//! Test fixtures and store helpers.
//!
//! Provides reference schemas and stores whose timestamps are driven by a
//! [`ManualClock`], so tests can reason about cursors exactly.

use replisync_core::{
    CollectionSchema, FieldDef, ManualClock, MemoryStore, Record, RecordId, RecordStore, Schema,
    StoreView, Timestamp,
};
use replisync_protocol::{ChangeSet, PushRequest, RecordPayload};
use serde_json::json;
use std::sync::Arc;

/// Projects and tasks referencing each other.
///
/// - `projects`: `name` (text, max 100, required), `lead_task` -> `tasks`
/// - `tasks`: `title` (text, max 200, required), `project` -> `projects`
pub fn projects_tasks_schema() -> Schema {
    Schema::new()
        .with_collection(
            CollectionSchema::new("projects")
                .field(FieldDef::text("name").max_len(100).required())
                .foreign_key("lead_task", "tasks"),
        )
        .with_collection(
            CollectionSchema::new("tasks")
                .field(FieldDef::text("title").max_len(200).required())
                .foreign_key("project", "projects"),
        )
}

/// Users and their student profiles.
///
/// - `users`: `username` (required), `email`, `first_name`, `last_name`
/// - `student_profiles`: `bio`, `user` -> `users`
pub fn users_profiles_schema() -> Schema {
    Schema::new()
        .with_collection(
            CollectionSchema::new("users")
                .field(FieldDef::text("username").max_len(150).required())
                .field(FieldDef::text("email").max_len(254))
                .field(FieldDef::text("first_name").max_len(150))
                .field(FieldDef::text("last_name").max_len(150)),
        )
        .with_collection(
            CollectionSchema::new("student_profiles")
                .field(FieldDef::text("bio"))
                .foreign_key("user", "users"),
        )
}

/// Two collections with mutual foreign keys, named so that the referencing
/// side sorts either first or last.
///
/// `owner` has a field `member_ref` pointing at `member`; `member` has a
/// field `owner_ref` pointing back.
pub fn mutual_schema(owner: &str, member: &str) -> Schema {
    Schema::new()
        .with_collection(
            CollectionSchema::new(owner)
                .field(FieldDef::text("label"))
                .foreign_key("member_ref", member),
        )
        .with_collection(
            CollectionSchema::new(member)
                .field(FieldDef::text("label"))
                .foreign_key("owner_ref", owner),
        )
}

/// A memory store stamped by a manual clock.
pub struct TestStore {
    /// The store.
    pub store: Arc<MemoryStore>,
    /// The clock stamping every mutation and pull.
    pub clock: Arc<ManualClock>,
}

impl TestStore {
    /// Creates an empty store over `schema`.
    pub fn new(schema: Schema) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryStore::with_clock(schema, clock.clone())
            .expect("Failed to open memory store");
        Self {
            store: Arc::new(store),
            clock,
        }
    }

    /// Creates an empty store over [`projects_tasks_schema`].
    pub fn projects_tasks() -> Self {
        Self::new(projects_tasks_schema())
    }

    /// Fetches a record, live or tombstoned.
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.store
            .read(|view| view.get(collection, &RecordId::new(id)))
            .expect("Failed to read record")
    }

    /// Returns the current clock reading without advancing it.
    pub fn now(&self) -> Timestamp {
        self.clock.peek()
    }
}

impl std::ops::Deref for TestStore {
    type Target = MemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A task payload with a title.
pub fn task(id: &str, title: &str) -> RecordPayload {
    RecordPayload::new(id).with("title", json!(title))
}

/// A project payload with a name.
pub fn project(id: &str, name: &str) -> RecordPayload {
    RecordPayload::new(id).with("name", json!(name))
}

/// A push request from `(collection, changes)` pairs.
pub fn push_of(entries: Vec<(&str, ChangeSet)>) -> PushRequest {
    entries
        .into_iter()
        .fold(PushRequest::new(), |request, (collection, changes)| {
            request.with_changes(collection, changes)
        })
}
