//! Collection schemas and the foreign-key dependency graph.
//!
//! A [`Schema`] names every collection that takes part in synchronization.
//! Each collection declares scalar fields and nullable foreign keys into other
//! collections. Foreign keys may form cycles (a project points at its lead
//! task while tasks point back at their project); the batch applier handles
//! any such graph without per-cycle special cases, so the
//! [`DependencyGraph`] only exists for diagnostics.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Field names managed by the record store itself.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// Value type of a scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text, optionally length-limited (in characters).
    Text {
        /// Maximum length in characters.
        max_len: Option<usize>,
    },
    /// Signed 64-bit integer.
    Integer,
    /// Floating point number (integers are accepted).
    Float,
    /// Boolean.
    Boolean,
    /// Any JSON value, stored opaquely.
    Json,
}

impl FieldKind {
    /// Checks a non-null value against this kind.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (FieldKind::Text { max_len }, Value::String(s)) => match max_len {
                Some(max) if s.chars().count() > *max => {
                    Err(format!("ensure this field has no more than {max} characters"))
                }
                _ => Ok(()),
            },
            (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            (FieldKind::Float, Value::Number(_)) => Ok(()),
            (FieldKind::Boolean, Value::Bool(_)) => Ok(()),
            (FieldKind::Json, _) => Ok(()),
            (kind, _) => Err(format!("expected {}", kind.name())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Json => "json",
        }
    }
}

/// Declaration of a scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Value type.
    pub kind: FieldKind,
    /// Whether the field must be supplied when a record is created.
    pub required: bool,
    /// Whether the field may hold `null`.
    pub nullable: bool,
}

impl FieldDef {
    /// Creates an optional, nullable field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: true,
        }
    }

    /// Creates an unbounded text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { max_len: None })
    }

    /// Creates an integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Creates a boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Limits a text field to `max` characters.
    #[must_use]
    pub fn max_len(mut self, max: usize) -> Self {
        if let FieldKind::Text { max_len } = &mut self.kind {
            *max_len = Some(max);
        }
        self
    }

    /// Marks the field as required and non-nullable.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self.nullable = false;
        self
    }
}

/// A nullable reference from one collection to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Field holding the referenced record ID.
    pub field: String,
    /// Name of the referenced collection.
    pub target: String,
}

/// Schema of one entity collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    name: String,
    fields: Vec<FieldDef>,
    foreign_keys: Vec<ForeignKey>,
}

impl CollectionSchema {
    /// Creates an empty collection schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a scalar field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a nullable foreign key referencing `target`.
    #[must_use]
    pub fn foreign_key(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.push(ForeignKey {
            field: field.into(),
            target: target.into(),
        });
        self
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scalar field declarations.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the foreign key declarations.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Looks up a scalar field.
    pub fn scalar(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a foreign key by its field name.
    pub fn link(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.field == name)
    }

    fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.foreign_keys.iter().map(|fk| fk.field.as_str()))
    }
}

/// The set of collections that are synchronized together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    collections: BTreeMap<String, CollectionSchema>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection, replacing any previous one with the same name.
    #[must_use]
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.collections
            .insert(collection.name.clone(), collection);
        self
    }

    /// Returns the schema of a collection.
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Returns the schema of a collection or an `UnknownCollection` error.
    pub fn require(&self, name: &str) -> CoreResult<&CollectionSchema> {
        self.collection(name)
            .ok_or_else(|| CoreError::UnknownCollection {
                name: name.to_string(),
            })
    }

    /// Iterates over all collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.collections.values()
    }

    /// Iterates over collection names in order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Checks the schema for internal consistency.
    ///
    /// Rejects duplicate or reserved field names and foreign keys whose
    /// target collection is not part of the schema.
    pub fn validate(&self) -> CoreResult<()> {
        for collection in self.collections.values() {
            let mut seen = BTreeSet::new();
            for name in collection.field_names() {
                if RESERVED_FIELDS.contains(&name) {
                    return Err(CoreError::invalid_schema(format!(
                        "{}.{name} uses a reserved field name",
                        collection.name
                    )));
                }
                if !seen.insert(name) {
                    return Err(CoreError::invalid_schema(format!(
                        "{}.{name} is declared twice",
                        collection.name
                    )));
                }
            }
            for fk in &collection.foreign_keys {
                if !self.collections.contains_key(&fk.target) {
                    return Err(CoreError::invalid_schema(format!(
                        "{}.{} references unknown collection {}",
                        collection.name, fk.field, fk.target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the collection-level foreign-key graph.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for collection in self.collections.values() {
            let targets = edges.entry(collection.name.clone()).or_default();
            for fk in &collection.foreign_keys {
                targets.insert(fk.target.clone());
            }
        }
        DependencyGraph { edges }
    }
}

/// Directed graph of "collection A holds a foreign key into collection B".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Returns the collections that `collection` references.
    pub fn dependencies(&self, collection: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(collection)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Returns true if `from` reaches `to` through one or more edges.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack: Vec<&str> = self.dependencies(from).collect();
        let mut visited = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if visited.insert(node) {
                stack.extend(self.dependencies(node));
            }
        }
        false
    }

    /// Returns every collection that lies on a foreign-key cycle, including
    /// self-references.
    pub fn cyclic_collections(&self) -> BTreeSet<String> {
        self.edges
            .keys()
            .filter(|name| self.reaches(name, name))
            .cloned()
            .collect()
    }

    /// Returns true if the graph contains at least one cycle.
    pub fn is_cyclic(&self) -> bool {
        self.edges.keys().any(|name| self.reaches(name, name))
    }
}
