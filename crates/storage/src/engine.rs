//! The in-memory engine.
//!
//! All state sits behind one mutex. Commits, fetches and topology broadcasts take it
//! for their whole duration, so a tracker's signals for one transaction are sent
//! without interleaving, and `TrackedQuery::fetch` observes either all or none of a
//! transaction.

use crate::cache::StoreCache;
use crate::diff::diff;
use crate::executor;
use crate::transaction::Transaction;
use hashbrown::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace, warn};
use vigil_core::{Error, Record, RecordId, Result, StoreId};
use vigil_query::{
    LiveSignal, LiveSink, QueryDefinition, QueryEngine, Snapshot, StoreTopology, TopologyEvent,
    TopologySink, TrackedQuery,
};

struct Target {
    query: QueryDefinition,
    snapshot: Snapshot,
}

/// Live subscription handed out by `MemoryEngine::track`.
pub struct Tracker {
    engine: Weak<Shared>,
    sink: Arc<dyn LiveSink>,
    target: Mutex<Option<Target>>,
}

impl Tracker {
    fn target(&self) -> MutexGuard<'_, Option<Target>> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-runs the tracked query after a commit and sends the bracketed changes.
    /// Returns false once the sink is gone.
    fn refresh(&self, cache: &StoreCache, updated: &HashSet<RecordId>) -> bool {
        let mut guard = self.target();
        let Some(target) = guard.as_mut() else {
            return true;
        };
        let snapshot = match executor::execute(cache, &target.query) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, entity = target.query.entity(), "tracked query failed after commit");
                return true;
            }
        };
        let events = diff(&target.snapshot, &snapshot, updated);
        target.snapshot = snapshot.clone();
        if events.is_empty() {
            return true;
        }

        trace!(entity = target.query.entity(), events = events.len(), "sending live changes");
        let mut alive = self.sink.send_signal(LiveSignal::WillChange);
        for event in events {
            alive = alive && self.sink.send_signal(LiveSignal::Change(event));
        }
        alive && self.sink.send_signal(LiveSignal::DidChange(snapshot))
    }
}

impl TrackedQuery for Tracker {
    fn fetch(&self, query: &QueryDefinition) -> Result<Snapshot> {
        let shared = self
            .engine
            .upgrade()
            .ok_or_else(|| Error::fetch_failed(query.entity(), "engine dropped"))?;
        let state = shared.state();
        state.check_fetch(query)?;
        let snapshot = executor::execute(&state.cache, query)?;
        *self.target() = Some(Target {
            query: query.clone(),
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }
}

struct EngineState {
    cache: StoreCache,
    trackers: Vec<Weak<Tracker>>,
    topology_sinks: Vec<Arc<dyn TopologySink>>,
    fetch_failure: Option<String>,
}

impl EngineState {
    fn check_fetch(&self, query: &QueryDefinition) -> Result<()> {
        match &self.fetch_failure {
            Some(message) => Err(Error::fetch_failed(query.entity(), message.clone())),
            None => Ok(()),
        }
    }

    fn broadcast(&mut self, event: TopologyEvent) {
        let before = self.topology_sinks.len();
        self.topology_sinks.retain(|sink| sink.send_topology(event.clone()));
        let dropped = before - self.topology_sinks.len();
        if dropped > 0 {
            warn!(dropped, "topology sinks disconnected");
        }
    }
}

struct Shared {
    state: Mutex<EngineState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory engine with attachable stores, transactions and live tracking.
///
/// Cloning yields another handle to the same engine.
///
/// # Example
///
/// ```
/// use vigil_core::{Record, Value};
/// use vigil_query::{QueryDefinition, QueryEngine};
/// use vigil_storage::MemoryEngine;
///
/// let engine = MemoryEngine::new();
/// let store = engine.attach_store("main");
/// let id = engine
///     .perform(|tx| tx.insert(store, Record::draft("Task").with_field("title", "write docs")))
///     .unwrap();
///
/// let snapshot = engine.execute(&QueryDefinition::new("Task")).unwrap();
/// assert_eq!(snapshot.record_at(0), Some(id));
/// assert_eq!(engine.record(id).unwrap().get("title"), Some(&Value::from("write docs")));
/// ```
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState {
                    cache: StoreCache::new(),
                    trackers: Vec::new(),
                    topology_sinks: Vec::new(),
                    fetch_failure: None,
                }),
            }),
        }
    }

    /// Attaches a new store and announces it to topology subscribers.
    pub fn attach_store(&self, name: impl Into<String>) -> StoreId {
        let name = name.into();
        let mut state = self.shared.state();
        state.broadcast(TopologyEvent::StoresWillChange { removed: Vec::new() });
        let id = state.cache.attach(name.as_str());
        state.broadcast(TopologyEvent::StoresDidChange {
            added: vec![id],
            removed: Vec::new(),
        });
        debug!(store = %id, name = %name, "attached store");
        id
    }

    /// Detaches a store and announces it to topology subscribers.
    ///
    /// Tracked queries are not sent live changes for the records that disappear;
    /// monitors refetch on the topology event instead.
    pub fn detach_store(&self, id: StoreId) -> Result<()> {
        let mut state = self.shared.state();
        if !state.cache.has_store(id) {
            return Err(Error::StoreNotFound(id));
        }
        state.broadcast(TopologyEvent::StoresWillChange { removed: vec![id] });
        let store = state.cache.detach(id)?;
        state.broadcast(TopologyEvent::StoresDidChange {
            added: Vec::new(),
            removed: vec![id],
        });
        debug!(store = %id, records = store.len(), "detached store");
        Ok(())
    }

    /// Runs `f` as one transaction.
    ///
    /// If `f` fails every change it made is rolled back and the error is returned.
    /// Otherwise the changes are committed and every live tracked query whose result
    /// changed receives one bracketed batch of signals.
    pub fn perform<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut guard = self.shared.state();
        let state = &mut *guard;

        let mut tx = Transaction::begin(&mut state.cache);
        let tx_id = tx.id();
        let value = match f(&mut tx) {
            Ok(value) => value,
            Err(err) => {
                debug!(tx = tx_id, error = %err, "transaction rolled back");
                tx.rollback();
                return Err(err);
            }
        };
        let updated = tx.journal().updated();
        let entries = tx.commit();
        debug!(tx = tx_id, changes = entries.len(), "transaction committed");
        if entries.is_empty() {
            return Ok(value);
        }

        let cache = &state.cache;
        state.trackers.retain(|weak| match weak.upgrade() {
            Some(tracker) => {
                let alive = tracker.refresh(cache, &updated);
                if !alive {
                    warn!("live sink disconnected, dropping tracked query");
                }
                alive
            }
            None => false,
        });
        Ok(value)
    }

    /// Returns a copy of a record.
    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.shared.state().cache.record(id).cloned()
    }

    /// Returns the attached store ids in ascending order.
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.shared.state().cache.store_ids()
    }

    /// Number of tracked queries still alive.
    pub fn tracker_count(&self) -> usize {
        self.shared
            .state()
            .trackers
            .iter()
            .filter(|t| t.strong_count() > 0)
            .count()
    }

    /// Makes every fetch fail with `message` until called with `None`.
    ///
    /// Commits are unaffected. Intended for exercising failure handling.
    pub fn set_fetch_failure(&self, message: Option<String>) {
        self.shared.state().fetch_failure = message;
    }
}

impl QueryEngine for MemoryEngine {
    fn execute(&self, query: &QueryDefinition) -> Result<Snapshot> {
        let state = self.shared.state();
        state.check_fetch(query)?;
        executor::execute(&state.cache, query)
    }

    fn affected_stores(&self, query: &QueryDefinition) -> HashSet<StoreId> {
        executor::affected_stores(&self.shared.state().cache, query)
    }

    fn track(&self, sink: Arc<dyn LiveSink>) -> Arc<dyn TrackedQuery> {
        let tracker = Arc::new(Tracker {
            engine: Arc::downgrade(&self.shared),
            sink,
            target: Mutex::new(None),
        });
        self.shared.state().trackers.push(Arc::downgrade(&tracker));
        tracker
    }
}

impl StoreTopology for MemoryEngine {
    fn subscribe_topology(&self, sink: Arc<dyn TopologySink>) {
        self.shared.state().topology_sinks.push(sink);
    }
}
