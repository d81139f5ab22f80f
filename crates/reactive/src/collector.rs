//! Translation of live-update signals into bracketed dispatch steps.
//!
//! The collector owns the `ChangeScope` and decides, for each incoming `LiveSignal`,
//! what the monitor must do: announce a batch, forward a delta, or install the
//! resulting snapshot and close the batch. It never calls observers itself.

use crate::change_set::ChangeSet;
use crate::scope::ChangeScope;
use alloc::vec::Vec;
use core::mem;
use vigil_query::{ChangeEvent, LiveSignal, Snapshot};

/// What the monitor should do with one signal.
#[derive(Debug, PartialEq)]
pub enum CollectorStep {
    /// Nothing to dispatch.
    Ignored,
    /// The outermost content scope opened; emit will-change.
    WillChange,
    /// A nested content scope opened.
    Nested,
    /// Forward this delta to observers.
    Delta(ChangeEvent),
    /// Install `snapshot`. `completed` is set when the last content scope closed, in
    /// which case did-change must follow.
    Install {
        snapshot: Snapshot,
        completed: Option<ChangeSet>,
    },
}

/// Per-monitor signal state machine.
#[derive(Debug)]
pub struct ChangeCollector {
    scope: ChangeScope,
    enabled: bool,
    events: Vec<ChangeEvent>,
}

impl Default for ChangeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self {
            scope: ChangeScope::new(),
            enabled: true,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn scope(&self) -> &ChangeScope {
        &self.scope
    }

    #[inline]
    pub fn scope_mut(&mut self) -> &mut ChangeScope {
        &mut self.scope
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stops dispatch; every signal is dropped until `enable`.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Processes one signal.
    pub fn accept(&mut self, signal: LiveSignal) -> CollectorStep {
        if !self.enabled {
            tracing::trace!(?signal, "dispatch disabled, dropping signal");
            return CollectorStep::Ignored;
        }
        match signal {
            LiveSignal::WillChange => {
                if self.scope.begin_content() {
                    self.events.clear();
                    CollectorStep::WillChange
                } else {
                    CollectorStep::Nested
                }
            }
            LiveSignal::Change(event) => {
                if !self.scope.is_content_open() {
                    tracing::warn!(%event, "change outside of a change scope, dropping");
                    return CollectorStep::Ignored;
                }
                self.events.push(event.clone());
                CollectorStep::Delta(event)
            }
            LiveSignal::DidChange(snapshot) => match self.scope.end_content() {
                None => {
                    tracing::warn!("did-change without a matching will-change, dropping");
                    CollectorStep::Ignored
                }
                Some(drained) => {
                    let completed = drained
                        .then(|| ChangeSet::from_events(mem::take(&mut self.events), snapshot.clone()));
                    CollectorStep::Install { snapshot, completed }
                }
            },
        }
    }
}
