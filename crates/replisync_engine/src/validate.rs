//! Field-level checks of push payloads.
//!
//! The batch applier only needs a yes/no answer with a reason per item, so
//! validation sits behind the [`PayloadValidator`] trait. [`SchemaValidator`]
//! checks payloads against the collection's declared fields.

use replisync_core::{CollectionSchema, RecordId};
use replisync_protocol::{FieldChange, RecordPayload};
use serde_json::Value;

/// Decides whether a payload may be applied.
///
/// Both methods return a human-readable reason on rejection. Keys the
/// collection does not declare must be tolerated; the applier ignores them.
pub trait PayloadValidator: Send + Sync {
    /// Checks a payload from a `created` list.
    fn validate_create(
        &self,
        collection: &CollectionSchema,
        payload: &RecordPayload,
    ) -> Result<(), String>;

    /// Checks a payload from an `updated` list. Only present fields are
    /// checked.
    fn validate_update(
        &self,
        collection: &CollectionSchema,
        payload: &RecordPayload,
    ) -> Result<(), String>;
}

/// Validates payloads against the declared field types.
///
/// - scalar values must match their [`FieldKind`](replisync_core::FieldKind),
///   including text length limits
/// - non-nullable fields cannot be set to `null`
/// - required fields must be present on create
/// - foreign keys must be a record ID or `null`
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    fn check_present(collection: &CollectionSchema, payload: &RecordPayload) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, change) in &payload.fields {
            if let Some(def) = collection.scalar(name) {
                match change {
                    FieldChange::Clear if !def.nullable => {
                        problems.push(format!("{name}: this field may not be null"));
                    }
                    FieldChange::Clear => {}
                    FieldChange::Set(value) => {
                        if let Err(reason) = def.kind.check(value) {
                            problems.push(format!("{name}: {reason}"));
                        }
                    }
                }
            } else if collection.link(name).is_some() {
                if let Err(reason) = link_target(change) {
                    problems.push(format!("{name}: {reason}"));
                }
            }
        }
        problems
    }

    fn verdict(problems: Vec<String>) -> Result<(), String> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

impl PayloadValidator for SchemaValidator {
    fn validate_create(
        &self,
        collection: &CollectionSchema,
        payload: &RecordPayload,
    ) -> Result<(), String> {
        let mut problems = Self::check_present(collection, payload);
        for def in collection.fields().iter().filter(|def| def.required) {
            if !matches!(payload.get(&def.name), Some(FieldChange::Set(_))) {
                problems.push(format!("{}: this field is required", def.name));
            }
        }
        Self::verdict(problems)
    }

    fn validate_update(
        &self,
        collection: &CollectionSchema,
        payload: &RecordPayload,
    ) -> Result<(), String> {
        Self::verdict(Self::check_present(collection, payload))
    }
}

/// Reads the target of a foreign-key change. `Ok(None)` clears the link.
pub(crate) fn link_target(change: &FieldChange) -> Result<Option<RecordId>, String> {
    match change {
        FieldChange::Clear => Ok(None),
        FieldChange::Set(Value::String(id)) if !id.is_empty() => Ok(Some(RecordId::new(id.as_str()))),
        FieldChange::Set(Value::Number(n)) if n.is_u64() || n.is_i64() => {
            Ok(Some(RecordId::new(n.to_string())))
        }
        FieldChange::Set(_) => Err("expected a record id or null".to_string()),
    }
}
