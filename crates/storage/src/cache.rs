//! Cache management for the in-memory engine.
//!
//! This module provides the `StoreCache` struct which manages the attached stores.

use crate::record_store::RecordStore;
use std::collections::BTreeMap;
use vigil_core::{Error, Record, RecordId, Result, StoreId};

/// Cache for managing multiple record stores.
#[derive(Debug)]
pub struct StoreCache {
    /// Store id → RecordStore mapping.
    stores: BTreeMap<StoreId, RecordStore>,
    /// Next store id to assign. Ids are never reused.
    next_store: u32,
}

impl StoreCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self {
            stores: BTreeMap::new(),
            next_store: 1,
        }
    }

    /// Attaches a new empty store and returns its id.
    pub fn attach(&mut self, name: impl Into<String>) -> StoreId {
        let id = StoreId::new(self.next_store);
        self.next_store += 1;
        self.stores.insert(id, RecordStore::new(id, name));
        id
    }

    /// Detaches a store, returning its contents.
    pub fn detach(&mut self, id: StoreId) -> Result<RecordStore> {
        self.stores.remove(&id).ok_or(Error::StoreNotFound(id))
    }

    pub fn store(&self, id: StoreId) -> Option<&RecordStore> {
        self.stores.get(&id)
    }

    pub fn store_mut(&mut self, id: StoreId) -> Result<&mut RecordStore> {
        self.stores.get_mut(&id).ok_or(Error::StoreNotFound(id))
    }

    /// Returns the attached store ids in ascending order.
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.stores.keys().copied().collect()
    }

    pub fn has_store(&self, id: StoreId) -> bool {
        self.stores.contains_key(&id)
    }

    /// Gets a record by id.
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.stores.get(&id.store()).and_then(|s| s.get(id))
    }

    /// Iterates over every record of every attached store.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.stores.values().flat_map(RecordStore::iter)
    }

    /// Returns the total record count across all stores.
    pub fn total_record_count(&self) -> usize {
        self.stores.values().map(RecordStore::len).sum()
    }
}

impl Default for StoreCache {
    fn default() -> Self {
        Self::new()
    }
}
