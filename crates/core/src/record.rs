//! Record structure for Vigil.
//!
//! A `Record` is one stored object of some entity kind. Its `RecordId` is owned by
//! the backing store and is the only thing snapshots and change events hold on to.

use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt;

/// Identifier of a backing store attached to an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(u32);

impl StoreId {
    /// Creates a store identifier.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Opaque, stable identity of a record.
///
/// Equality and hashing are by `(store, key)`. A `RecordId` taken from a superseded
/// snapshot may refer to a record that no longer exists in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    store: StoreId,
    key: u64,
}

impl RecordId {
    /// Placeholder id of a record that has not been inserted into a store yet.
    pub const UNASSIGNED: RecordId = RecordId::new(StoreId::new(0), 0);

    /// Creates a record identifier inside the given store.
    #[inline]
    pub const fn new(store: StoreId, key: u64) -> Self {
        Self { store, key }
    }

    /// Returns the store that owns this record.
    #[inline]
    pub const fn store(self) -> StoreId {
        self.store
    }

    /// Returns the store-local key.
    #[inline]
    pub const fn key(self) -> u64 {
        self.key
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.key)
    }
}

/// A record stored in a backing store.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Identity of this record.
    id: RecordId,
    /// Entity kind ("Task", "Note", ...).
    entity: String,
    /// Version number for change detection. Incremented on each update.
    version: u64,
    /// Field values by name.
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record of the given entity kind.
    /// Version defaults to 1 for new records.
    pub fn new(id: RecordId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            version: 1,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a record that has no identity yet. Stores assign one on insert.
    pub fn draft(entity: impl Into<String>) -> Self {
        Self::new(RecordId::UNASSIGNED, entity)
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Reassigns the identity. Used by stores when a staged record is committed.
    pub fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    #[inline]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Gets a field value. Missing fields read as absent, not as `Null`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Gets a field value, treating a missing field as `Null`.
    pub fn get_or_null(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Sets a field and returns the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Iterates over the fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
