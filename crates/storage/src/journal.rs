//! Journal for tracking changes within a transaction.
//!
//! Changes are applied to the cache as they happen; the journal keeps what is needed
//! to undo them and to tell live trackers which records were touched.

use crate::cache::StoreCache;
use hashbrown::HashSet;
use vigil_core::{Record, RecordId};

/// A single journal entry representing a change.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// A record was inserted.
    Insert { id: RecordId },
    /// A record was updated; `old` is its state before the update.
    Update { old: Record },
    /// A record was deleted.
    Delete { record: Record },
}

impl JournalEntry {
    /// Returns the id of the record this entry refers to.
    pub fn record_id(&self) -> RecordId {
        match self {
            JournalEntry::Insert { id } => *id,
            JournalEntry::Update { old } => old.id(),
            JournalEntry::Delete { record } => record.id(),
        }
    }
}

/// Ordered log of the changes made by one transaction.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn record_insert(&mut self, id: RecordId) {
        self.entries.push(JournalEntry::Insert { id });
    }

    pub fn record_update(&mut self, old: Record) {
        self.entries.push(JournalEntry::Update { old });
    }

    pub fn record_delete(&mut self, record: Record) {
        self.entries.push(JournalEntry::Delete { record });
    }

    /// Returns all journal entries.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the journal is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the ids of records whose contents changed in place.
    pub fn updated(&self) -> HashSet<RecordId> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Update { old } => Some(old.id()),
                _ => None,
            })
            .collect()
    }

    /// Finalizes the journal and returns its entries.
    pub fn commit(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Undoes every recorded change, newest first.
    pub fn rollback(&mut self, cache: &mut StoreCache) {
        for entry in self.entries.drain(..).rev() {
            let id = entry.record_id();
            let Ok(store) = cache.store_mut(id.store()) else {
                continue;
            };
            match entry {
                JournalEntry::Insert { id } => {
                    let _ = store.delete(id);
                }
                JournalEntry::Update { old } => store.restore(old),
                JournalEntry::Delete { record } => store.restore(record),
            }
        }
    }
}
