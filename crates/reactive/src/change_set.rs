//! Change set for tracking one closed batch of result changes.
//!
//! A ChangeSet collects every event of a content scope, in delivery order, together
//! with the snapshot installed when the scope closed.

use alloc::vec::Vec;
use vigil_core::RecordId;
use vigil_query::{ChangeEvent, Snapshot};

/// A set of changes to a monitored result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Events in the order they were dispatched
    pub events: Vec<ChangeEvent>,
    /// The complete result after applying the events
    pub current: Snapshot,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<ChangeEvent>, current: Snapshot) -> Self {
        Self { events, current }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the total number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Records inserted into the result.
    pub fn inserted(&self) -> Vec<RecordId> {
        self.collect(|e| match e {
            ChangeEvent::RowInserted { record, .. } => Some(*record),
            _ => None,
        })
    }

    /// Records removed from the result.
    pub fn deleted(&self) -> Vec<RecordId> {
        self.collect(|e| match e {
            ChangeEvent::RowDeleted { record, .. } => Some(*record),
            _ => None,
        })
    }

    /// Records updated in place or moved.
    pub fn modified(&self) -> Vec<RecordId> {
        self.collect(|e| match e {
            ChangeEvent::RowUpdated { record, .. } | ChangeEvent::RowMoved { record, .. } => Some(*record),
            _ => None,
        })
    }

    fn collect(&self, select: impl Fn(&ChangeEvent) -> Option<RecordId>) -> Vec<RecordId> {
        self.events.iter().filter_map(select).collect()
    }

    /// Appends another change set; its snapshot replaces this one's.
    pub fn merge(&mut self, other: ChangeSet) {
        self.events.extend(other.events);
        self.current = other.current;
    }

    /// Adds an event.
    #[inline]
    pub fn push(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    /// Clears all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
