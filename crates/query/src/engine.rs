//! Interfaces a backing engine implements for monitors.
//!
//! Engines run on arbitrary threads, so every handle here is `Send + Sync`. Signals are
//! pushed into sinks; a sink returning `false` means its receiver is gone and the
//! engine may stop feeding it.

use crate::change::LiveSignal;
use crate::definition::QueryDefinition;
use crate::snapshot::Snapshot;
use alloc::sync::Arc;
use hashbrown::HashSet;
use vigil_core::{Result, StoreId};

/// Receiver of live-update signals for one tracked query.
pub trait LiveSink: Send + Sync {
    /// Delivers a signal. Returns `false` once the receiver has been dropped.
    fn send_signal(&self, signal: LiveSignal) -> bool;
}

/// A live-update subscription created by `QueryEngine::track`.
pub trait TrackedQuery: Send + Sync {
    /// Executes `query` and retargets the subscription to it in one step, so that no
    /// committed transaction falls between the returned snapshot and the next signal.
    fn fetch(&self, query: &QueryDefinition) -> Result<Snapshot>;
}

/// Executes queries against the backing stores.
pub trait QueryEngine: Send + Sync {
    /// Runs a one-shot fetch.
    fn execute(&self, query: &QueryDefinition) -> Result<Snapshot>;

    /// Returns the attached stores whose records can appear in `query`'s result.
    fn affected_stores(&self, query: &QueryDefinition) -> HashSet<StoreId>;

    /// Opens a subscription that feeds `sink`. It tracks nothing until the first
    /// `TrackedQuery::fetch`.
    fn track(&self, sink: Arc<dyn LiveSink>) -> Arc<dyn TrackedQuery>;
}
