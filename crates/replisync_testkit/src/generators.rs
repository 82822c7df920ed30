//! Property-based test generators using proptest.
//!
//! Provides strategies for generating record IDs, push batches over the
//! reference schemas and interleavings of mutations with pulls.

use crate::fixtures::task;
use proptest::prelude::*;
use replisync_core::RecordId;
use replisync_protocol::{ChangeSet, PushRequest, RecordPayload};
use serde_json::json;

/// Strategy for generating opaque hexadecimal record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    any::<u128>().prop_map(|bits| RecordId::new(format!("{:032x}", bits)))
}

/// Strategy for generating task titles within the 200 character limit.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ]{1,40}").expect("Invalid regex")
}

/// Strategy for a batch creating `owner`/`member` pairs over
/// [`mutual_schema`](crate::fixtures::mutual_schema), each side referencing
/// the other.
///
/// Pair `i` is owner `o{i}` and member `m{i}`. The created lists are
/// shuffled independently, so references often point at records declared
/// later in the batch.
pub fn mutual_batch_strategy(
    owner: &'static str,
    member: &'static str,
    max_pairs: usize,
) -> impl Strategy<Value = (usize, PushRequest)> {
    (1..=max_pairs.max(1))
        .prop_flat_map(|pairs| {
            let owners: Vec<usize> = (0..pairs).collect();
            let members: Vec<usize> = (0..pairs).collect();
            (
                Just(pairs),
                Just(owners).prop_shuffle(),
                Just(members).prop_shuffle(),
            )
        })
        .prop_map(move |(pairs, owners, members)| {
            let owned = owners.into_iter().fold(ChangeSet::new(), |set, i| {
                set.create(
                    RecordPayload::new(format!("o{i}"))
                        .with("label", json!(format!("owner {i}")))
                        .with("member_ref", json!(format!("m{i}"))),
                )
            });
            let membered = members.into_iter().fold(ChangeSet::new(), |set, i| {
                set.create(
                    RecordPayload::new(format!("m{i}"))
                        .with("label", json!(format!("member {i}")))
                        .with("owner_ref", json!(format!("o{i}"))),
                )
            });
            let request = PushRequest::new()
                .with_changes(owner, owned)
                .with_changes(member, membered);
            (pairs, request)
        })
}

/// One step of a generated sync history over the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStep {
    /// Create task `t{n}`.
    Create(u8),
    /// Retitle task `t{n}`.
    Update(u8),
    /// Delete task `t{n}`.
    Delete(u8),
    /// Pull and remember the returned cursor.
    Pull,
}

impl HistoryStep {
    /// Returns the push request performing this step, `None` for a pull.
    pub fn to_push(&self) -> Option<PushRequest> {
        let changes = match self {
            HistoryStep::Create(n) => ChangeSet::new().create(task(&format!("t{n}"), "new")),
            HistoryStep::Update(n) => {
                ChangeSet::new().update(task(&format!("t{n}"), &format!("edit {n}")))
            }
            HistoryStep::Delete(n) => ChangeSet::new().delete(format!("t{n}")),
            HistoryStep::Pull => return None,
        };
        Some(PushRequest::new().with_changes("tasks", changes))
    }
}

/// Strategy for a history of up to `max_steps` steps over a small ID space,
/// so that creates, updates and deletes of the same record interleave.
pub fn history_strategy(max_steps: usize) -> impl Strategy<Value = Vec<HistoryStep>> {
    let step = prop_oneof![
        3 => (0u8..6).prop_map(HistoryStep::Create),
        3 => (0u8..6).prop_map(HistoryStep::Update),
        2 => (0u8..6).prop_map(HistoryStep::Delete),
        2 => Just(HistoryStep::Pull),
    ];
    prop::collection::vec(step, 1..=max_steps.max(1))
}
