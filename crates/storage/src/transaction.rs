//! Transaction management for the in-memory engine.
//!
//! A `Transaction` borrows the store cache for the duration of one
//! `MemoryEngine::perform` call. Every change is journaled so that a failing
//! transaction body leaves the cache untouched.

use crate::cache::StoreCache;
use crate::journal::{Journal, JournalEntry};
use std::sync::atomic::{AtomicU64, Ordering};
use vigil_core::{Error, Record, RecordId, Result, StoreId};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A write transaction over the attached stores.
pub struct Transaction<'a> {
    /// Unique transaction ID.
    id: TransactionId,
    cache: &'a mut StoreCache,
    /// Journal for tracking changes.
    journal: Journal,
    /// Current state.
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(cache: &'a mut StoreCache) -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            cache,
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Inserts a record into `store`. The record's id is replaced by a fresh one,
    /// which is returned.
    pub fn insert(&mut self, store: StoreId, record: Record) -> Result<RecordId> {
        let id = self.cache.store_mut(store)?.insert(record);
        self.journal.record_insert(id);
        Ok(id)
    }

    /// Updates a record in place. The record keeps its id and entity kind, and its
    /// version is bumped.
    pub fn update<F>(&mut self, id: RecordId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Record),
    {
        let record = self
            .cache
            .store_mut(id.store())?
            .get_mut(id)
            .ok_or(Error::RecordNotFound(id))?;
        let old = record.clone();
        f(record);
        if record.entity() != old.entity() {
            *record = old;
            return Err(Error::invalid_query("an update cannot change a record's entity"));
        }
        record.set_id(id);
        record.increment_version();
        self.journal.record_update(old);
        Ok(())
    }

    /// Deletes a record and returns it.
    pub fn delete(&mut self, id: RecordId) -> Result<Record> {
        let record = self.cache.store_mut(id.store())?.delete(id)?;
        self.journal.record_delete(record.clone());
        Ok(record)
    }

    /// Reads a record, including changes made earlier in this transaction.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.cache.record(id)
    }

    /// Returns the changes made so far.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Commits the transaction and returns its journal entries.
    pub(crate) fn commit(mut self) -> Vec<JournalEntry> {
        self.state = TransactionState::Committed;
        self.journal.commit()
    }

    /// Rolls back every change made by this transaction.
    pub(crate) fn rollback(mut self) {
        self.state = TransactionState::RolledBack;
        self.journal.rollback(self.cache);
    }
}
