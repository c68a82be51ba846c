//! Entity store contract
//!
//! The executor only ever reads through [`EntityStore::find_many`]. Stores
//! return records holding exactly the projected fields, with relation
//! fields carrying their nested records.

mod memory;
mod seaorm;

pub use memory::MemoryStore;
pub use seaorm::{SeaOrmStore, entity};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;

/// Value of one record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Scalar(String),
    Records(Vec<Record>),
}

/// A single row returned by a store, with relations already attached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the record for chaining
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field names present on the record
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// The set of fields requested for one type
///
/// Scalars map to `None`; relations map to the nested projection of the
/// related type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: BTreeMap<String, Option<Projection>>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a scalar field
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.add_scalar(name);
        self
    }

    /// Request a relation with the given nested projection
    pub fn relation(mut self, name: impl Into<String>, nested: Projection) -> Self {
        self.add_relation(name, nested);
        self
    }

    pub fn add_scalar(&mut self, name: impl Into<String>) {
        self.fields.entry(name.into()).or_insert(None);
    }

    /// Add a relation, merging with an existing request for it
    pub fn add_relation(&mut self, name: impl Into<String>, nested: Projection) {
        let slot = self.fields.entry(name.into()).or_insert(None);
        match slot {
            Some(existing) => existing.merge(nested),
            None => *slot = Some(nested),
        }
    }

    pub fn merge(&mut self, other: Projection) {
        for (name, nested) in other.fields {
            match nested {
                Some(nested) => self.add_relation(name, nested),
                None => self.add_scalar(name),
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Nested projection of a relation field
    pub fn nested(&self, name: &str) -> Option<&Projection> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Requested field names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A read-only persistence layer
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch every record of `entity_kind`, shaped by `projection`, in store order
    async fn find_many(
        &self,
        entity_kind: &str,
        projection: &Projection,
    ) -> Result<Vec<Record>, StoreError>;
}
