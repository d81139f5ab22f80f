//! Structural change events and the live-update signal stream.

use crate::snapshot::{Section, Snapshot};
use core::fmt;
use vigil_core::{IndexPath, RecordId};

/// One structural change to a snapshot.
///
/// Row paths of deletions refer to the old snapshot; row paths of insertions refer to
/// the new one. Section indexes follow the same rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    RowInserted { record: RecordId, to: IndexPath },
    RowDeleted { record: RecordId, from: IndexPath },
    RowUpdated { record: RecordId, at: IndexPath },
    RowMoved { record: RecordId, from: IndexPath, to: IndexPath },
    SectionInserted { section: Section, to: usize },
    SectionDeleted { section: Section, from: usize },
}

impl ChangeEvent {
    /// Returns true for section-level events.
    #[inline]
    pub fn is_section_event(&self) -> bool {
        matches!(self, ChangeEvent::SectionInserted { .. } | ChangeEvent::SectionDeleted { .. })
    }

    /// Returns the record a row-level event refers to.
    pub fn record(&self) -> Option<RecordId> {
        match self {
            ChangeEvent::RowInserted { record, .. }
            | ChangeEvent::RowDeleted { record, .. }
            | ChangeEvent::RowUpdated { record, .. }
            | ChangeEvent::RowMoved { record, .. } => Some(*record),
            ChangeEvent::SectionInserted { .. } | ChangeEvent::SectionDeleted { .. } => None,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::RowInserted { record, to } => write!(f, "insert {} at {}", record, to),
            ChangeEvent::RowDeleted { record, from } => write!(f, "delete {} from {}", record, from),
            ChangeEvent::RowUpdated { record, at } => write!(f, "update {} at {}", record, at),
            ChangeEvent::RowMoved { record, from, to } => {
                write!(f, "move {} from {} to {}", record, from, to)
            }
            ChangeEvent::SectionInserted { section, to } => {
                write!(f, "insert section {:?} at {}", section.name(), to)
            }
            ChangeEvent::SectionDeleted { section, from } => {
                write!(f, "delete section {:?} from {}", section.name(), from)
            }
        }
    }
}

/// A signal from a tracked query.
///
/// Each store transaction that touches the query's result produces exactly one
/// `WillChange`, then its `Change`s in order, then one `DidChange` carrying the
/// resulting snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveSignal {
    WillChange,
    Change(ChangeEvent),
    DidChange(Snapshot),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use vigil_core::StoreId;

    #[test]
    fn test_event_accessors() {
        let id = RecordId::new(StoreId::new(1), 4);
        let ev = ChangeEvent::RowMoved {
            record: id,
            from: IndexPath::new(0, 0),
            to: IndexPath::new(1, 2),
        };
        assert_eq!(ev.record(), Some(id));
        assert!(!ev.is_section_event());
        assert_eq!(ev.to_string(), "move store#1/4 from (0, 0) to (1, 2)");

        let ev = ChangeEvent::SectionInserted {
            section: Section::new("high", None, vec![id]),
            to: 1,
        };
        assert!(ev.is_section_event());
        assert_eq!(ev.record(), None);
        assert_eq!(ev.to_string(), "insert section \"high\" at 1");
    }
}
