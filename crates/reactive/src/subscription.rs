//! Closure subscriptions to whole change sets.
//!
//! A subscriber receives each closed batch in one call, after the monitor's
//! did-change, instead of one call per event.

use crate::change_set::ChangeSet;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

pub type SubscriptionId = u64;

pub type ChangeCallback = Rc<dyn Fn(&ChangeSet)>;

/// Subscribed closures of one monitor, in subscription order.
#[derive(Default)]
pub struct SubscriptionManager {
    entries: Vec<(SubscriptionId, ChangeCallback)>,
    last_id: SubscriptionId,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `callback` and returns the id that removes it again. Ids start at 1 and
    /// are never reused.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + 'static,
    {
        self.last_id += 1;
        self.entries.push((self.last_id, Rc::new(callback)));
        self.last_id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn notify_all(&self, changes: &ChangeSet) {
        for callback in self.callbacks() {
            callback(changes);
        }
    }

    /// Snapshot of the current callbacks.
    ///
    /// A caller that can be re-entered by a callback takes this list and releases its
    /// borrow of the manager before invoking it.
    pub fn callbacks(&self) -> Vec<ChangeCallback> {
        self.entries.iter().map(|(_, callback)| callback.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(id, _)| id)).finish()
    }
}
