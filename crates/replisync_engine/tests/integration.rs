//! Integration tests for the sync engine.

use proptest::prelude::*;
use replisync_core::{
    CollectionSchema, CoreError, CoreResult, FieldDef, MemoryStore, Record, RecordId, RecordPatch,
    RecordStore, Schema, StoreView, StoreWriter, Timestamp,
};
use replisync_engine::{ApplyErrorKind, EngineConfig, SyncCoordinator, SyncError};
use replisync_protocol::{ChangeSet, PullResponse, RecordPayload};
use replisync_testkit::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;

fn coordinator(store: &TestStore) -> SyncCoordinator<MemoryStore> {
    SyncCoordinator::new(Arc::clone(&store.store))
}

fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.id().as_str()).collect()
}

fn deleted_ids(response: &PullResponse, collection: &str) -> Vec<String> {
    response.changes[collection]
        .deleted
        .iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

#[test]
fn project_links_task_created_in_same_batch() {
    init_tracing();
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let request = push_of(vec![
        ("tasks", ChangeSet::new().create(task("T1", "x"))),
        (
            "projects",
            ChangeSet::new().create(project("P1", "y").with("lead_task", json!("T1"))),
        ),
    ]);
    let response = sync.push(&request).unwrap();
    assert!(response.is_success(), "{:?}", response.errors());

    let p1 = store.get("projects", "P1").unwrap();
    assert_eq!(p1.link("lead_task"), Some(&RecordId::new("T1")));
    let t1 = store.get("tasks", "T1").unwrap();
    assert_eq!(t1.link("project"), None);
    assert_eq!(t1.field("title"), Some(&json!("x")));
}

#[test]
fn deleting_unknown_id_reports_only_that_item() {
    init_tracing();
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let request = push_of(vec![
        ("projects", ChangeSet::new().create(project("P1", "y"))),
        ("tasks", ChangeSet::new().create(task("T1", "x")).delete("Z9")),
    ]);
    let response = sync.push(&request).unwrap();

    assert_eq!(response.errors().len(), 1);
    let error = &response.errors()[0];
    assert!(error.contains("Z9"));
    assert!(error.contains("tasks"));

    assert!(store.get("projects", "P1").unwrap().is_live());
    assert!(store.get("tasks", "T1").unwrap().is_live());
}

#[test]
fn mutual_references_resolve_in_one_batch() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let request = push_of(vec![
        (
            "tasks",
            ChangeSet::new().create(task("T1", "x").with("project", json!("P1"))),
        ),
        (
            "projects",
            ChangeSet::new().create(project("P1", "y").with("lead_task", json!("T1"))),
        ),
    ]);
    assert!(sync.push(&request).unwrap().is_success());

    let p1 = store.get("projects", "P1").unwrap();
    let t1 = store.get("tasks", "T1").unwrap();
    assert_eq!(p1.link("lead_task"), Some(t1.id()));
    assert_eq!(t1.link("project"), Some(p1.id()));
}

#[test]
fn three_way_cycle_needs_no_extra_phase() {
    let schema = Schema::new()
        .with_collection(CollectionSchema::new("a").foreign_key("next", "b"))
        .with_collection(CollectionSchema::new("b").foreign_key("next", "c"))
        .with_collection(CollectionSchema::new("c").foreign_key("next", "a"));
    let store = TestStore::new(schema);
    let sync = coordinator(&store);

    let request = push_of(vec![
        ("c", ChangeSet::new().create(RecordPayload::new("c1").with("next", json!("a1")))),
        ("a", ChangeSet::new().create(RecordPayload::new("a1").with("next", json!("b1")))),
        ("b", ChangeSet::new().create(RecordPayload::new("b1").with("next", json!("c1")))),
    ]);
    assert!(sync.push(&request).unwrap().is_success());

    for (collection, id, next) in [("a", "a1", "b1"), ("b", "b1", "c1"), ("c", "c1", "a1")] {
        let record = store.get(collection, id).unwrap();
        assert_eq!(record.link("next"), Some(&RecordId::new(next)));
    }
}

#[test]
fn self_reference_within_collection() {
    let schema = Schema::new().with_collection(
        CollectionSchema::new("nodes")
            .field(FieldDef::text("label"))
            .foreign_key("parent", "nodes"),
    );
    let store = TestStore::new(schema);
    let sync = coordinator(&store);

    let request = push_of(vec![(
        "nodes",
        ChangeSet::new()
            .create(RecordPayload::new("child").with("parent", json!("root")))
            .create(RecordPayload::new("root").with("label", json!("top"))),
    )]);
    assert!(sync.push(&request).unwrap().is_success());
    assert_eq!(
        store.get("nodes", "child").unwrap().link("parent"),
        Some(&RecordId::new("root"))
    );
}

#[test]
fn full_snapshot_lists_live_as_created_and_tombstones_as_deleted() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let request = push_of(vec![(
        "tasks",
        ChangeSet::new()
            .create(task("T1", "a"))
            .create(task("T2", "b"))
            .create(task("T3", "c")),
    )]);
    sync.push(&request).unwrap();
    let request = push_of(vec![(
        "tasks",
        ChangeSet::new().update(task("T1", "edited")).delete("T2"),
    )]);
    sync.push(&request).unwrap();

    let snapshot = sync.pull(None).unwrap();
    let tasks = &snapshot.changes["tasks"];
    assert_eq!(ids(&tasks.created), vec!["T1", "T3"]);
    assert!(tasks.updated.is_empty());
    assert_eq!(deleted_ids(&snapshot, "tasks"), vec!["T2"]);

    // every collection is present, even without changes
    assert!(snapshot.changes["projects"].is_empty());
}

#[test]
fn incremental_pull_classifies_changes() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    sync.push(&push_of(vec![(
        "tasks",
        ChangeSet::new().create(task("T1", "a")).create(task("T2", "b")),
    )]))
    .unwrap();
    let cursor = sync.pull(None).unwrap().timestamp;

    sync.push(&push_of(vec![(
        "tasks",
        ChangeSet::new()
            .create(task("T3", "c"))
            .update(task("T1", "edited"))
            .delete("T2"),
    )]))
    .unwrap();

    let delta = sync.pull_since(Some(cursor)).unwrap();
    let tasks = &delta.changes["tasks"];
    assert_eq!(ids(&tasks.created), vec!["T3"]);
    assert_eq!(ids(&tasks.updated), vec!["T1"]);
    assert_eq!(deleted_ids(&delta, "tasks"), vec!["T2"]);
    assert!(delta.timestamp > cursor);

    let again = sync.pull_since(Some(delta.timestamp)).unwrap();
    assert_eq!(again.change_count(), 0);
}

#[test]
fn created_then_deleted_between_pulls_is_only_deleted() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    let cursor = sync.pull(None).unwrap().timestamp;

    sync.push(&push_of(vec![("tasks", ChangeSet::new().create(task("T1", "a")))]))
        .unwrap();
    sync.push(&push_of(vec![("tasks", ChangeSet::new().delete("T1"))]))
        .unwrap();

    let delta = sync.pull_since(Some(cursor)).unwrap();
    assert!(delta.changes["tasks"].created.is_empty());
    assert!(delta.changes["tasks"].updated.is_empty());
    assert_eq!(deleted_ids(&delta, "tasks"), vec!["T1"]);
}

#[test]
fn tombstones_reject_updates_and_recreation() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    sync.push(&push_of(vec![("tasks", ChangeSet::new().create(task("T1", "a")))]))
        .unwrap();
    sync.push(&push_of(vec![("tasks", ChangeSet::new().delete("T1"))]))
        .unwrap();
    let deleted_at = store.get("tasks", "T1").unwrap().deleted_at();

    let errors = sync
        .push_detailed(&push_of(vec![(
            "tasks",
            ChangeSet::new()
                .update(task("T1", "resurrected"))
                .create(task("T1", "again")),
        )]))
        .unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ApplyErrorKind::NotFound));

    let t1 = store.get("tasks", "T1").unwrap();
    assert!(!t1.is_live());
    assert_eq!(t1.field("title"), Some(&json!("a")));
    assert_eq!(t1.deleted_at(), deleted_at);

    // deleting again is a no-op
    let response = sync
        .push(&push_of(vec![("tasks", ChangeSet::new().delete("T1"))]))
        .unwrap();
    assert!(response.is_success());
    assert_eq!(store.get("tasks", "T1").unwrap().deleted_at(), deleted_at);
}

#[test]
fn update_is_partial_and_null_clears_links() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    sync.push(&push_of(vec![
        ("projects", ChangeSet::new().create(project("P1", "y"))),
        (
            "tasks",
            ChangeSet::new().create(task("T1", "x").with("project", json!("P1"))),
        ),
    ]))
    .unwrap();

    sync.push(&push_of(vec![(
        "tasks",
        ChangeSet::new().update(task("T1", "renamed")),
    )]))
    .unwrap();
    let t1 = store.get("tasks", "T1").unwrap();
    assert_eq!(t1.field("title"), Some(&json!("renamed")));
    assert_eq!(t1.link("project"), Some(&RecordId::new("P1")));

    sync.push(&push_of(vec![(
        "tasks",
        ChangeSet::new().update(RecordPayload::new("T1").with("project", Value::Null)),
    )]))
    .unwrap();
    let t1 = store.get("tasks", "T1").unwrap();
    assert_eq!(t1.field("title"), Some(&json!("renamed")));
    assert_eq!(t1.link("project"), None);
    assert!(t1.updated_at() > t1.created_at());
}

#[test]
fn update_pointing_at_missing_record_is_rejected_whole() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    sync.push(&push_of(vec![("tasks", ChangeSet::new().create(task("T1", "x")))]))
        .unwrap();

    let errors = sync
        .push_detailed(&push_of(vec![(
            "tasks",
            ChangeSet::new().update(task("T1", "changed").with("project", json!("P404"))),
        )]))
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ApplyErrorKind::NotFound);
    assert!(errors[0].message.contains("P404"));
    assert_eq!(store.get("tasks", "T1").unwrap().field("title"), Some(&json!("x")));
}

#[test]
fn linkage_to_deleted_record_fails_that_field_only() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    sync.push(&push_of(vec![("projects", ChangeSet::new().create(project("P1", "y")))]))
        .unwrap();
    sync.push(&push_of(vec![("projects", ChangeSet::new().delete("P1"))]))
        .unwrap();

    let errors = sync
        .push_detailed(&push_of(vec![(
            "tasks",
            ChangeSet::new().create(task("T1", "x").with("project", json!("P1"))),
        )]))
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ApplyErrorKind::Linkage);

    let t1 = store.get("tasks", "T1").unwrap();
    assert!(t1.is_live());
    assert_eq!(t1.link("project"), None);
}

#[test]
fn update_linking_to_task_deleted_later_in_batch_is_cleared() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    sync.push(&push_of(vec![
        ("projects", ChangeSet::new().create(project("P1", "y"))),
        ("tasks", ChangeSet::new().create(task("T1", "x"))),
    ]))
    .unwrap();

    let errors = sync
        .push_detailed(&push_of(vec![
            (
                "projects",
                ChangeSet::new().update(project("P1", "renamed").with("lead_task", json!("T1"))),
            ),
            ("tasks", ChangeSet::new().delete("T1")),
        ]))
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ApplyErrorKind::Linkage);
    assert!(errors[0].message.contains("was deleted"));

    let p1 = store.get("projects", "P1").unwrap();
    assert_eq!(p1.field("name"), Some(&json!("renamed")));
    assert_eq!(p1.link("lead_task"), None);
    assert!(!store.get("tasks", "T1").unwrap().is_live());
}

#[test]
fn validation_failures_do_not_block_siblings() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let long_title = "t".repeat(201);
    let errors = sync
        .push_detailed(&push_of(vec![(
            "tasks",
            ChangeSet::new()
                .create(task("T1", &long_title))
                .create(RecordPayload::new("T2"))
                .create(task("T3", "fine")),
        )]))
        .unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ApplyErrorKind::Validation));
    assert!(store.get("tasks", "T1").is_none());
    assert!(store.get("tasks", "T2").is_none());
    assert!(store.get("tasks", "T3").is_some());
}

#[test]
fn malformed_requests_touch_nothing() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let err = sync
        .push(&push_of(vec![
            ("tasks", ChangeSet::new().create(task("T1", "x"))),
            ("widgets", ChangeSet::new().delete("W1")),
        ]))
        .unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(store.total_count(), 0);

    let before = store.now();
    assert!(sync.pull(Some("last tuesday")).unwrap_err().is_malformed());
    assert!(sync.pull(Some("-1")).unwrap_err().is_malformed());
    assert_eq!(store.now(), before);
}

#[test]
fn null_cursor_means_full_snapshot() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    sync.push(&push_of(vec![("tasks", ChangeSet::new().create(task("T1", "x")))]))
        .unwrap();

    for raw in [None, Some(""), Some("null"), Some("0")] {
        let response = sync.pull(raw).unwrap();
        assert_eq!(ids(&response.changes["tasks"].created), vec!["T1"]);
    }
}

#[test]
fn repeated_pull_is_stable() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);
    sync.push(&push_of(vec![(
        "tasks",
        ChangeSet::new().create(task("T1", "x")).create(task("T2", "y")),
    )]))
    .unwrap();
    let cursor = Some(Timestamp::from_millis(1));

    let first = sync.pull_since(cursor).unwrap();
    let second = sync.pull_since(cursor).unwrap();
    assert_eq!(first.changes, second.changes);
    assert!(second.timestamp > first.timestamp);
}

#[test]
fn server_timestamps_override_client_values() {
    let store = TestStore::projects_tasks();
    let sync = coordinator(&store);

    let payload: RecordPayload = serde_json::from_value(json!({
        "id": "T1",
        "title": "x",
        "created_at": 1,
        "updated_at": 1,
        "_status": "created",
    }))
    .unwrap();
    let before = store.now();
    sync.push(&push_of(vec![("tasks", ChangeSet::new().create(payload))]))
        .unwrap();

    let t1 = store.get("tasks", "T1").unwrap();
    assert!(t1.created_at() >= before);
}

// ---------------------------------------------------------------------------
// Store failures
// ---------------------------------------------------------------------------

/// Wraps a store so that every delete fails inside the backend.
struct FailingDeletes {
    inner: MemoryStore,
}

struct FailingWriter<'a> {
    inner: &'a mut dyn StoreWriter,
}

impl StoreView for FailingWriter<'_> {
    fn schema(&self) -> Arc<Schema> {
        self.inner.schema()
    }

    fn now(&self) -> Timestamp {
        self.inner.now()
    }

    fn get(&self, collection: &str, id: &RecordId) -> CoreResult<Option<Record>> {
        self.inner.get(collection, id)
    }

    fn changed_since(&self, collection: &str, since: Timestamp) -> CoreResult<Vec<Record>> {
        self.inner.changed_since(collection, since)
    }
}

impl StoreWriter for FailingWriter<'_> {
    fn insert(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<Record> {
        self.inner.insert(collection, id, fields)
    }

    fn update(
        &mut self,
        collection: &str,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> CoreResult<Record> {
        self.inner.update(collection, id, patch)
    }

    fn mark_deleted(&mut self, _collection: &str, _id: &RecordId) -> CoreResult<Record> {
        Err(CoreError::backend("connection lost"))
    }
}

impl RecordStore for FailingDeletes {
    fn schema(&self) -> Arc<Schema> {
        self.inner.schema()
    }

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreView) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.inner.read(f)
    }

    fn write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWriter) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.inner.write_transaction(|txn| {
            let mut failing = FailingWriter { inner: txn };
            f(&mut failing)
        })
    }
}

#[test]
fn store_failure_rolls_back_whole_batch() {
    init_tracing();
    let store = FailingDeletes {
        inner: MemoryStore::new(projects_tasks_schema()).unwrap(),
    };
    let sync = SyncCoordinator::new(Arc::new(store));

    let ok = sync
        .push(&push_of(vec![("tasks", ChangeSet::new().create(task("T0", "kept")))]))
        .unwrap();
    assert!(ok.is_success());

    let err = sync
        .push(&push_of(vec![
            ("projects", ChangeSet::new().create(project("P1", "y"))),
            ("tasks", ChangeSet::new().create(task("T1", "x")).delete("T0")),
        ]))
        .unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));

    let snapshot = sync.pull(None).unwrap();
    assert_eq!(ids(&snapshot.changes["tasks"].created), vec!["T0"]);
    assert!(snapshot.changes["projects"].is_empty());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn pull_sees_all_or_none_of_a_push() {
    let store = Arc::new(MemoryStore::new(projects_tasks_schema()).unwrap());
    let sync = Arc::new(SyncCoordinator::new(Arc::clone(&store)));

    let writer = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || {
            for i in 0..200 {
                let request = push_of(vec![
                    (
                        "projects",
                        ChangeSet::new().create(
                            project(&format!("P{i}"), "p").with("lead_task", json!(format!("T{i}"))),
                        ),
                    ),
                    (
                        "tasks",
                        ChangeSet::new()
                            .create(task(&format!("T{i}"), "t").with("project", json!(format!("P{i}")))),
                    ),
                ]);
                assert!(sync.push(&request).unwrap().is_success());
            }
        })
    };

    let mut last = Timestamp::EPOCH;
    for _ in 0..200 {
        let snapshot = sync.pull(None).unwrap();
        let projects = snapshot.changes["projects"].created.len();
        let tasks = snapshot.changes["tasks"].created.len();
        assert_eq!(projects, tasks, "pull observed half a batch");
        for p in &snapshot.changes["projects"].created {
            assert!(p.link("lead_task").is_some(), "pull observed an unlinked record");
        }
        assert!(snapshot.timestamp > last);
        last = snapshot.timestamp;
    }

    writer.join().unwrap();
    assert_eq!(store.count("projects"), 200);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// A client replica of the `tasks` collection built only from pulls.
#[derive(Debug, Default)]
struct Replica {
    tasks: BTreeMap<String, Value>,
    cursor: Option<Timestamp>,
}

impl Replica {
    fn apply(&mut self, response: &PullResponse) {
        let delta = &response.changes["tasks"];
        for record in delta.created.iter().chain(&delta.updated) {
            let title = record.field("title").cloned().unwrap_or(Value::Null);
            self.tasks.insert(record.id().as_str().to_string(), title);
        }
        for id in &delta.deleted {
            self.tasks.remove(id.as_str());
        }
        self.cursor = Some(response.timestamp);
    }
}

fn assert_exclusive(response: &PullResponse) -> Result<(), TestCaseError> {
    for delta in response.changes.values() {
        let mut seen = BTreeSet::new();
        let created = delta.created.iter().map(Record::id);
        let updated = delta.updated.iter().map(Record::id);
        for id in created.chain(updated).chain(delta.deleted.iter()) {
            prop_assert!(seen.insert(id.clone()), "{} appears twice", id);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn mutual_batches_link_in_any_order(
        (pairs, request) in mutual_batch_strategy("alpha", "zeta", 6),
        owner_first in any::<bool>(),
    ) {
        // with owner "zeta" the referencing collection is processed last
        let (owner, member) = if owner_first { ("alpha", "zeta") } else { ("zeta", "alpha") };
        let store = TestStore::new(mutual_schema(owner, member));
        let sync = coordinator(&store);

        let mut request = request;
        if !owner_first {
            // the generator labels collections alpha (owner) and zeta (member)
            let owned = request.changes.remove("alpha").unwrap_or_default();
            let membered = request.changes.remove("zeta").unwrap_or_default();
            request.changes.insert("zeta".into(), owned);
            request.changes.insert("alpha".into(), membered);
        }

        let response = sync.push(&request).unwrap();
        prop_assert!(response.is_success(), "{:?}", response.errors());

        for i in 0..pairs {
            let o = store.get(owner, &format!("o{i}")).unwrap();
            let m = store.get(member, &format!("m{i}")).unwrap();
            prop_assert_eq!(o.link("member_ref"), Some(m.id()));
            prop_assert_eq!(m.link("owner_ref"), Some(o.id()));
        }
    }

    #[test]
    fn pulls_are_exclusive_and_converge(steps in history_strategy(40)) {
        let store = TestStore::projects_tasks();
        let sync = coordinator(&store);
        let mut replica = Replica::default();
        let mut cursors = vec![None];

        for step in &steps {
            match step.to_push() {
                Some(request) => {
                    sync.push(&request).unwrap();
                }
                None => {
                    let response = sync.pull_since(replica.cursor).unwrap();
                    assert_exclusive(&response)?;
                    replica.apply(&response);
                    cursors.push(replica.cursor);
                }
            }
        }

        let response = sync.pull_since(replica.cursor).unwrap();
        assert_exclusive(&response)?;
        replica.apply(&response);

        let snapshot = sync.pull(None).unwrap();
        prop_assert!(snapshot.changes["tasks"].updated.is_empty());
        let live: BTreeMap<String, Value> = snapshot.changes["tasks"]
            .created
            .iter()
            .map(|r| {
                let title = r.field("title").cloned().unwrap_or(Value::Null);
                (r.id().as_str().to_string(), title)
            })
            .collect();
        prop_assert_eq!(&replica.tasks, &live);

        for cursor in cursors {
            let first = sync.pull_since(cursor).unwrap();
            let second = sync.pull_since(cursor).unwrap();
            assert_exclusive(&first)?;
            prop_assert_eq!(first.changes, second.changes);
        }
    }
}

#[test]
fn disabled_idempotent_creates_reports_duplicates() {
    let store = TestStore::projects_tasks();
    let sync = SyncCoordinator::with_config(
        Arc::clone(&store.store),
        EngineConfig::new().with_idempotent_creates(false),
    );
    let request = push_of(vec![("tasks", ChangeSet::new().create(task("T1", "x")))]);
    assert!(sync.push(&request).unwrap().is_success());

    let response = sync.push(&request).unwrap();
    assert_eq!(response.errors(), ["tasks T1: record already exists".to_string()]);
}

proptest! {
    #[test]
    fn acyclic_chain_links_on_first_push(
        user_id in record_id_strategy(),
        profile_id in record_id_strategy(),
        username in title_strategy(),
    ) {
        let store = TestStore::new(users_profiles_schema());
        let sync = coordinator(&store);

        let request = push_of(vec![
            (
                "student_profiles",
                ChangeSet::new().create(
                    RecordPayload::new(profile_id.clone())
                        .with("bio", json!("hi"))
                        .with("user", json!(user_id.as_str())),
                ),
            ),
            (
                "users",
                ChangeSet::new()
                    .create(RecordPayload::new(user_id.clone()).with("username", json!(username))),
            ),
        ]);
        let response = sync.push(&request).unwrap();
        prop_assert!(response.is_success(), "{:?}", response.errors());

        let profile = store.get("student_profiles", profile_id.as_str()).unwrap();
        prop_assert_eq!(profile.link("user"), Some(&user_id));

        let snapshot = sync.pull(None).unwrap();
        prop_assert_eq!(snapshot.changes["users"].created.len(), 1);
        prop_assert_eq!(snapshot.changes["student_profiles"].created.len(), 1);
    }
}
