//! Weak observer registry with tiered dispatch.
//!
//! Observers are identified by the address of their `Rc` allocation and held only
//! through `Weak` handles, so registering never keeps an observer alive. Dispatch
//! upgrades the live handles first and releases the registry borrow before calling
//! out, which lets callbacks register or remove observers freely.

use crate::observer::{Capabilities, ListObjectObserver, ListObserver, ListSectionObserver};
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use vigil_query::ChangeEvent;

struct ObserverRecord<S: ?Sized + 'static> {
    key: usize,
    list: Weak<dyn ListObserver<S>>,
    rows: Option<Weak<dyn ListObjectObserver<S>>>,
    sections: Option<Weak<dyn ListSectionObserver<S>>>,
}

impl<S: ?Sized + 'static> ObserverRecord<S> {
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::LIST;
        if self.rows.is_some() {
            caps = caps | Capabilities::ROWS;
        }
        if self.sections.is_some() {
            caps = caps | Capabilities::SECTIONS;
        }
        caps
    }

    #[inline]
    fn is_alive(&self) -> bool {
        self.list.strong_count() > 0
    }
}

fn key_of<O: ?Sized>(observer: &Rc<O>) -> usize {
    Rc::as_ptr(observer).cast::<()>() as usize
}

/// Registry of observers for one source.
pub struct ObserverRegistry<S: ?Sized + 'static> {
    records: RefCell<Vec<ObserverRecord<S>>>,
}

impl<S: ?Sized + 'static> Default for ObserverRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + 'static> ObserverRegistry<S> {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
        }
    }

    /// Registers for list-level notifications only.
    pub fn add_list<O>(&self, observer: &Rc<O>)
    where
        O: ListObserver<S> + 'static,
    {
        let list: Weak<dyn ListObserver<S>> = Rc::<O>::downgrade(observer);
        self.insert(ObserverRecord {
            key: key_of(observer),
            list,
            rows: None,
            sections: None,
        });
    }

    /// Registers for list and row notifications.
    pub fn add_object<O>(&self, observer: &Rc<O>)
    where
        O: ListObjectObserver<S> + 'static,
    {
        let list: Weak<dyn ListObserver<S>> = Rc::<O>::downgrade(observer);
        let rows: Weak<dyn ListObjectObserver<S>> = Rc::<O>::downgrade(observer);
        self.insert(ObserverRecord {
            key: key_of(observer),
            list,
            rows: Some(rows),
            sections: None,
        });
    }

    /// Registers for list, row and section notifications.
    pub fn add_section<O>(&self, observer: &Rc<O>)
    where
        O: ListSectionObserver<S> + 'static,
    {
        let list: Weak<dyn ListObserver<S>> = Rc::<O>::downgrade(observer);
        let rows: Weak<dyn ListObjectObserver<S>> = Rc::<O>::downgrade(observer);
        let sections: Weak<dyn ListSectionObserver<S>> = Rc::<O>::downgrade(observer);
        self.insert(ObserverRecord {
            key: key_of(observer),
            list,
            rows: Some(rows),
            sections: Some(sections),
        });
    }

    // Re-adding replaces the previous registration.
    fn insert(&self, record: ObserverRecord<S>) {
        let mut records = self.records.borrow_mut();
        records.retain(|r| r.key != record.key);
        records.push(record);
    }

    /// Unregisters an observer from every tier. Returns true if it was registered.
    ///
    /// Removing during a dispatch also skips the observer for the rest of that event.
    pub fn remove<O: ?Sized>(&self, observer: &Rc<O>) -> bool {
        let key = key_of(observer);
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| r.key != key);
        records.len() != before
    }

    pub fn contains<O: ?Sized>(&self, observer: &Rc<O>) -> bool {
        let key = key_of(observer);
        self.records.borrow().iter().any(|r| r.key == key && r.is_alive())
    }

    /// Returns the tiers an observer is registered for.
    pub fn capabilities_of<O: ?Sized>(&self, observer: &Rc<O>) -> Capabilities {
        let key = key_of(observer);
        self.records
            .borrow()
            .iter()
            .find(|r| r.key == key && r.is_alive())
            .map(ObserverRecord::capabilities)
            .unwrap_or(Capabilities::NONE)
    }

    /// Number of registered observers that are still alive.
    pub fn len(&self) -> usize {
        self.records.borrow().iter().filter(|r| r.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops records whose observer is gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(ObserverRecord::is_alive);
        before - records.len()
    }

    fn live<T: ?Sized>(&self, select: impl Fn(&ObserverRecord<S>) -> Option<&Weak<T>>) -> Vec<(usize, Rc<T>)> {
        let mut records = self.records.borrow_mut();
        records.retain(ObserverRecord::is_alive);
        records
            .iter()
            .filter_map(|r| Some((r.key, select(r)?.upgrade()?)))
            .collect()
    }

    // Observers removed by an earlier callback of the same dispatch are skipped.
    fn still_registered(&self, key: usize, tier: Capabilities) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|r| r.key == key && r.capabilities().contains(tier))
    }

    /// Calls `f` for every list-tier observer, in registration order.
    pub fn dispatch_list(&self, mut f: impl FnMut(&dyn ListObserver<S>)) {
        for (key, observer) in self.live(|r| Some(&r.list)) {
            if self.still_registered(key, Capabilities::LIST) {
                f(&*observer);
            }
        }
    }

    /// Calls `f` for every row-tier observer.
    pub fn dispatch_rows(&self, mut f: impl FnMut(&dyn ListObjectObserver<S>)) {
        for (key, observer) in self.live(|r| r.rows.as_ref()) {
            if self.still_registered(key, Capabilities::ROWS) {
                f(&*observer);
            }
        }
    }

    /// Calls `f` for every section-tier observer.
    pub fn dispatch_sections(&self, mut f: impl FnMut(&dyn ListSectionObserver<S>)) {
        for (key, observer) in self.live(|r| r.sections.as_ref()) {
            if self.still_registered(key, Capabilities::SECTIONS) {
                f(&*observer);
            }
        }
    }

    /// Routes one change event to the tier that handles it.
    pub fn dispatch_event(&self, source: &S, event: &ChangeEvent) {
        tracing::trace!(%event, "dispatching change");
        match event {
            ChangeEvent::RowInserted { record, to } => {
                self.dispatch_rows(|o| o.did_insert_object(source, *record, *to))
            }
            ChangeEvent::RowDeleted { record, from } => {
                self.dispatch_rows(|o| o.did_delete_object(source, *record, *from))
            }
            ChangeEvent::RowUpdated { record, at } => {
                self.dispatch_rows(|o| o.did_update_object(source, *record, *at))
            }
            ChangeEvent::RowMoved { record, from, to } => {
                self.dispatch_rows(|o| o.did_move_object(source, *record, *from, *to))
            }
            ChangeEvent::SectionInserted { section, to } => {
                self.dispatch_sections(|o| o.did_insert_section(source, section, *to))
            }
            ChangeEvent::SectionDeleted { section, from } => {
                self.dispatch_sections(|o| o.did_delete_section(source, section, *from))
            }
        }
    }
}
