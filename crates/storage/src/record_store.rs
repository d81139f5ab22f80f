//! Record storage for one attached store.

use std::collections::BTreeMap;
use vigil_core::{Error, Record, RecordId, Result, StoreId};

/// The records of one store, keyed by store-local key.
#[derive(Debug)]
pub struct RecordStore {
    id: StoreId,
    name: String,
    records: BTreeMap<u64, Record>,
    /// Next key to hand out. Keys are never reused.
    next_key: u64,
}

impl RecordStore {
    pub fn new(id: StoreId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            records: BTreeMap::new(),
            next_key: 1,
        }
    }

    #[inline]
    pub fn id(&self) -> StoreId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a record under a fresh key and returns its id.
    pub fn insert(&mut self, mut record: Record) -> RecordId {
        let id = RecordId::new(self.id, self.next_key);
        self.next_key += 1;
        record.set_id(id);
        self.records.insert(id.key(), record);
        id
    }

    /// Puts a record back under its own id. Used by rollback.
    pub(crate) fn restore(&mut self, record: Record) {
        self.records.insert(record.id().key(), record);
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        if id.store() != self.id {
            return None;
        }
        self.records.get(&id.key())
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        if id.store() != self.id {
            return None;
        }
        self.records.get_mut(&id.key())
    }

    pub fn delete(&mut self, id: RecordId) -> Result<Record> {
        if id.store() != self.id {
            return Err(Error::RecordNotFound(id));
        }
        self.records.remove(&id.key()).ok_or(Error::RecordNotFound(id))
    }

    /// Iterates over records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}
