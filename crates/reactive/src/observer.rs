//! Observer traits at three capability tiers.
//!
//! Every tier extends the one below it, so a section observer also receives row and
//! list notifications. All methods default to no-ops; observers take `&self` and keep
//! their own state behind `Cell`/`RefCell`.
//!
//! `S` is the source type passed back to each callback, normally the monitor.

use core::ops::BitOr;
use vigil_core::{IndexPath, RecordId};
use vigil_query::Section;

/// List-level notifications.
pub trait ListObserver<S: ?Sized> {
    /// A batch of changes is about to be delivered.
    fn list_will_change(&self, _source: &S) {}

    /// A batch of changes has been delivered and the new snapshot is installed.
    fn list_did_change(&self, _source: &S) {}

    /// A refetch has been requested. Row and section events stop once it launches
    /// and resume after `list_did_refetch`.
    fn list_will_refetch(&self, _source: &S) {}

    /// The refetched snapshot is installed.
    fn list_did_refetch(&self, _source: &S) {}
}

/// Row-level notifications.
pub trait ListObjectObserver<S: ?Sized>: ListObserver<S> {
    fn did_insert_object(&self, _source: &S, _record: RecordId, _to: IndexPath) {}

    fn did_delete_object(&self, _source: &S, _record: RecordId, _from: IndexPath) {}

    fn did_update_object(&self, _source: &S, _record: RecordId, _at: IndexPath) {}

    fn did_move_object(&self, _source: &S, _record: RecordId, _from: IndexPath, _to: IndexPath) {}
}

/// Section-level notifications.
pub trait ListSectionObserver<S: ?Sized>: ListObjectObserver<S> {
    fn did_insert_section(&self, _source: &S, _section: &Section, _to: usize) {}

    fn did_delete_section(&self, _source: &S, _section: &Section, _from: usize) {}
}

/// Set of notification tiers an observer registered for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const LIST: Capabilities = Capabilities(1);
    pub const ROWS: Capabilities = Capabilities(1 << 1);
    pub const SECTIONS: Capabilities = Capabilities(1 << 2);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}
