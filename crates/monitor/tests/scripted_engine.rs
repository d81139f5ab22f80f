//! Monitor behavior against an engine whose signals are scripted, covering orderings
//! the in-memory engine cannot produce deterministically.

mod common;

use common::*;
use hashbrown::HashSet;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use vigil_core::{IndexPath, RecordId, Result, StoreId};
use vigil_monitor::{InlineWorkQueue, ListMonitor, MonitorContext, MonitorOptions, WorkQueue};
use vigil_query::{
    ChangeEvent, LiveSignal, LiveSink, QueryDefinition, QueryEngine, QueryMutation, Section, Snapshot, TrackedQuery,
};

#[derive(Default)]
struct Script {
    /// Results handed out by successive fetches.
    results: VecDeque<Snapshot>,
    /// Sent through the fetching tracker's sink before the next fetch returns.
    burst: Vec<LiveSignal>,
}

#[derive(Clone, Default)]
struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    fn new(results: impl IntoIterator<Item = Snapshot>) -> Self {
        let engine = Self::default();
        engine.script.lock().unwrap().results.extend(results);
        engine
    }

    fn burst(&self, signals: Vec<LiveSignal>) {
        self.script.lock().unwrap().burst = signals;
    }
}

struct ScriptedTracker {
    script: Arc<Mutex<Script>>,
    sink: Arc<dyn LiveSink>,
}

impl TrackedQuery for ScriptedTracker {
    fn fetch(&self, _query: &QueryDefinition) -> Result<Snapshot> {
        let (snapshot, burst) = {
            let mut script = self.script.lock().unwrap();
            let snapshot = script.results.pop_front().expect("script ran out of results");
            (snapshot, std::mem::take(&mut script.burst))
        };
        for signal in burst {
            self.sink.send_signal(signal);
        }
        Ok(snapshot)
    }
}

impl QueryEngine for ScriptedEngine {
    fn execute(&self, _query: &QueryDefinition) -> Result<Snapshot> {
        Ok(self.script.lock().unwrap().results.front().cloned().unwrap_or_default())
    }

    fn affected_stores(&self, _query: &QueryDefinition) -> HashSet<StoreId> {
        HashSet::new()
    }

    fn track(&self, sink: Arc<dyn LiveSink>) -> Arc<dyn TrackedQuery> {
        Arc::new(ScriptedTracker {
            script: self.script.clone(),
            sink,
        })
    }
}

fn id(key: u64) -> RecordId {
    RecordId::new(StoreId::new(1), key)
}

fn flat(keys: &[u64]) -> Snapshot {
    Snapshot::new(vec![Section::new("", None, keys.iter().map(|&k| id(k)).collect())]).unwrap()
}

fn insert_bracket(key: u64, at: usize, after: &[u64]) -> Vec<LiveSignal> {
    vec![
        LiveSignal::WillChange,
        LiveSignal::Change(ChangeEvent::RowInserted {
            record: id(key),
            to: IndexPath::new(0, at),
        }),
        LiveSignal::DidChange(flat(after)),
    ]
}

fn monitor(engine: &ScriptedEngine, queue: Arc<dyn WorkQueue>) -> (ListMonitor, Rc<Recorder>) {
    init_tracing();
    let context = MonitorContext::new(Arc::new(engine.clone()), queue);
    let monitor = ListMonitor::new(context, QueryDefinition::new("Task"), MonitorOptions::new()).unwrap();
    let recorder = Rc::new(Recorder::default());
    monitor.add_object_observer(&recorder);
    (monitor, recorder)
}

#[test]
fn signals_racing_a_completion_are_replayed() {
    let engine = ScriptedEngine::new([flat(&[1, 2]), flat(&[1, 2, 3])]);
    let (monitor, recorder) = monitor(&engine, Arc::new(InlineWorkQueue));

    engine.burst(insert_bracket(4, 3, &[1, 2, 3, 4]));
    monitor.refetch(QueryMutation::new()).unwrap();
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillRefetch,
            Note::DidRefetch,
            Note::WillChange,
            Note::Insert(id(4), IndexPath::new(0, 3)),
            Note::DidChange,
        ]
    );
    assert_eq!(monitor.snapshot(), flat(&[1, 2, 3, 4]));
}

#[test]
fn chained_refetch_discards_deferred_signals() {
    let engine = ScriptedEngine::new([flat(&[1]), flat(&[1, 2]), flat(&[1, 2, 3])]);
    let queue = ManualQueue::new();
    let (monitor, recorder) = monitor(&engine, queue.clone());

    engine.burst(insert_bracket(9, 2, &[1, 2, 9]));
    monitor.refetch(QueryMutation::new()).unwrap();
    monitor.refetch(QueryMutation::new().limit(10)).unwrap();
    while monitor.is_pending_refetch() {
        queue.run_all();
        monitor.process_pending().unwrap();
    }

    assert_eq!(recorder.take(), vec![Note::WillRefetch, Note::DidRefetch]);
    assert_eq!(monitor.snapshot(), flat(&[1, 2, 3]));
    assert_eq!(monitor.query().fetch_limit(), 10);
}

#[test]
fn delta_outside_change_scope_is_dropped() {
    let engine = ScriptedEngine::new([flat(&[1])]);
    engine.burst(vec![LiveSignal::Change(ChangeEvent::RowDeleted {
        record: id(1),
        from: IndexPath::new(0, 0),
    })]);
    let (monitor, recorder) = monitor(&engine, Arc::new(InlineWorkQueue));

    assert_eq!(monitor.process_pending().unwrap(), 1);
    assert!(recorder.notes().is_empty());
    assert_eq!(monitor.object_count(), 1);
}

#[test]
fn nested_scopes_notify_once() {
    let engine = ScriptedEngine::new([flat(&[1])]);
    engine.burst(vec![
        LiveSignal::WillChange,
        LiveSignal::WillChange,
        LiveSignal::Change(ChangeEvent::RowInserted {
            record: id(2),
            to: IndexPath::new(0, 1),
        }),
        LiveSignal::DidChange(flat(&[1, 2])),
        LiveSignal::DidChange(flat(&[1, 2])),
    ]);
    let (monitor, recorder) = monitor(&engine, Arc::new(InlineWorkQueue));

    monitor.process_pending().unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::Insert(id(2), IndexPath::new(0, 1)),
            Note::DidChange
        ]
    );
    assert_eq!(monitor.object_count(), 2);
}
