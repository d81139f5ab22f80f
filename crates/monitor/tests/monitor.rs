//! Integration tests for `ListMonitor` over the in-memory engine.

mod common;

use common::*;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{Error, IndexPath, Record, RecordId, StoreId, Value};
use vigil_monitor::{
    ChangeSet, InitialFetch, InlineWorkQueue, ListMonitor, ListObserver, MonitorOptions, TokioWorkQueue,
};
use vigil_query::{IndexTitle, Predicate, QueryDefinition, QueryEngine, QueryMutation, SectionBy};
use vigil_storage::MemoryEngine;

struct Seeded {
    engine: Arc<MemoryEngine>,
    store: StoreId,
    t1: RecordId,
    t2: RecordId,
    t3: RecordId,
}

/// `[low: [T1, T3], high: [T2]]`
fn seeded() -> Seeded {
    init_tracing();
    let engine = Arc::new(MemoryEngine::new());
    let store = engine.attach_store("main");
    let t1 = insert(&engine, store, task("low", 1));
    let t2 = insert(&engine, store, task("high", 5));
    let t3 = insert(&engine, store, task("low", 3));
    Seeded {
        engine,
        store,
        t1,
        t2,
        t3,
    }
}

fn inline_monitor(s: &Seeded, query: QueryDefinition) -> ListMonitor {
    ListMonitor::new(context(&s.engine, Arc::new(InlineWorkQueue)), query, MonitorOptions::new()).unwrap()
}

fn watch(monitor: &ListMonitor) -> Rc<Recorder> {
    let recorder = Rc::new(Recorder::default());
    monitor.add_section_observer(&recorder);
    recorder
}

#[test]
fn insert_into_existing_section() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    assert_eq!(monitor.objects_in_section(0), vec![s.t1, s.t3]);
    assert_eq!(monitor.objects_in_section(1), vec![s.t2]);

    let recorder = watch(&monitor);
    let t4 = insert(&s.engine, s.store, task("high", 2));
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::Insert(t4, IndexPath::new(1, 0)),
            Note::DidChange
        ]
    );
    assert_eq!(monitor.object_at_path(IndexPath::new(1, 0)), t4);
    assert_eq!(monitor.path_of(s.t2), Some(IndexPath::new(1, 1)));
}

#[test]
fn accessors_follow_section_order() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());

    assert_eq!(monitor.object_count(), 3);
    assert_eq!(monitor.section_count(), 2);
    let flat: Vec<RecordId> = (0..monitor.object_count()).map(|i| monitor.object_at(i)).collect();
    assert_eq!(flat, monitor.objects_in_all_sections());
    assert_eq!(flat, vec![s.t1, s.t3, s.t2]);
    assert_eq!(monitor.safe_object_at(monitor.object_count()), None);

    assert_eq!(monitor.index_of(s.t2), Some(2));
    assert_eq!(monitor.section_at(1).name(), "high");
    assert_eq!(monitor.safe_section_at(2), None);
    assert_eq!(monitor.safe_object_at_path(IndexPath::new(0, 2)), None);
    assert_eq!(monitor.safe_object_at_path(IndexPath::new(5, 0)), None);
    assert_eq!(monitor.number_of_objects_in_section(0), 2);
    assert_eq!(monitor.safe_number_of_objects_in_section(2), None);
    assert_eq!(monitor.safe_objects_in_section(2), None);
    assert!(monitor.has_sections());
    assert!(monitor.has_objects());
    assert!(monitor.has_objects_in_section(1));
    assert!(!monitor.has_objects_in_section(2));
    assert_eq!(monitor.sections().len(), 2);
    assert!(!monitor.is_pending_refetch());
}

#[test]
#[should_panic(expected = "object index 3 out of range")]
fn object_at_out_of_range_panics() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    monitor.object_at(3);
}

#[test]
#[should_panic(expected = "section index 2 out of range")]
fn object_at_path_checks_section_first() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    monitor.object_at_path(IndexPath::new(2, 0));
}

#[test]
fn section_index_titles() {
    let s = seeded();
    let query = tasks_by_priority().section_by(
        SectionBy::new("priority")
            .descending()
            .with_index_title(IndexTitle::FirstLetter),
    );
    let monitor = inline_monitor(&s, query);
    assert_eq!(monitor.section_index_titles(), vec!["L", "H"]);
    assert_eq!(monitor.target_section_for_index_title("H", 0), Some(1));
    assert_eq!(monitor.target_section_for_index_title("Z", 0), Some(0));
    assert_eq!(monitor.target_section_for_index_title("Z", 7), None);
}

#[test]
fn sections_with_equal_labels_stay_distinct() {
    init_tracing();
    let engine = Arc::new(MemoryEngine::new());
    let store = engine.attach_store("main");
    let tagged = |priority: Value| Record::draft("Task").with_field("priority", priority);
    let one = insert(&engine, store, tagged(Value::Int64(1)));
    insert(&engine, store, tagged(Value::Int64(2)));
    let text_one = insert(&engine, store, tagged(Value::String("1".into())));

    let query = QueryDefinition::new("Task").section_by(SectionBy::new("priority"));
    let monitor = ListMonitor::new(context(&engine, Arc::new(InlineWorkQueue)), query, MonitorOptions::new()).unwrap();
    let names: Vec<String> = monitor.sections().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["1", "2", "1"]);
    assert_eq!(monitor.path_of(one), Some(IndexPath::new(0, 0)));

    let recorder = watch(&monitor);
    engine.perform(|tx| tx.delete(text_one).map(|_| ())).unwrap();
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::DeleteSection("1".into(), 2),
            Note::Delete(text_one, IndexPath::new(2, 0)),
            Note::DidChange,
        ]
    );
    assert_eq!(monitor.section_count(), 2);
}

#[test]
fn deltas_are_bracketed() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let recorder = watch(&monitor);

    s.engine
        .perform(|tx| {
            tx.update(s.t3, |r| {
                r.set("priority", "high");
            })?;
            tx.delete(s.t1).map(|_| ())
        })
        .unwrap();
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::DeleteSection("low".into(), 0),
            Note::Delete(s.t1, IndexPath::new(0, 0)),
            Note::Move(s.t3, IndexPath::new(0, 1), IndexPath::new(0, 0)),
            Note::DidChange,
        ]
    );
    assert_eq!(monitor.objects_in_all_sections(), vec![s.t3, s.t2]);

    // Several commits: every delta sits inside its own bracket.
    for due in 10..13 {
        insert(&s.engine, s.store, task("high", due));
    }
    s.engine
        .perform(|tx| tx.update(s.t2, |r| {
            r.set("due", Value::DateTime(20));
        }))
        .unwrap();
    monitor.process_pending().unwrap();

    let mut open = false;
    let mut brackets = 0;
    for note in recorder.take() {
        match note {
            Note::WillChange => {
                assert!(!open);
                open = true;
            }
            Note::DidChange => {
                assert!(open);
                open = false;
                brackets += 1;
            }
            ref delta => assert!(open && delta.is_delta(), "{delta:?} outside a bracket"),
        }
    }
    assert!(!open);
    assert_eq!(brackets, 4);
    assert_eq!(monitor.snapshot(), s.engine.execute(&tasks_by_priority()).unwrap());
}

#[test]
fn registration_is_idempotent() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let recorder = Rc::new(Recorder::default());
    monitor.add_section_observer(&recorder);
    monitor.add_section_observer(&recorder);
    monitor.add_section_observer(&recorder);

    let t4 = insert(&s.engine, s.store, task("high", 2));
    monitor.process_pending().unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::Insert(t4, IndexPath::new(1, 0)),
            Note::DidChange
        ]
    );

    // Re-adding at a lower tier replaces the registration.
    monitor.add_list_observer(&recorder);
    insert(&s.engine, s.store, task("high", 3));
    monitor.process_pending().unwrap();
    assert_eq!(recorder.take(), vec![Note::WillChange, Note::DidChange]);
}

#[test]
fn removed_and_dropped_observers_are_skipped() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let kept = watch(&monitor);
    let removed = watch(&monitor);
    let dropped = watch(&monitor);

    assert!(monitor.remove_observer(&removed));
    assert!(!monitor.remove_observer(&removed));
    drop(dropped);

    insert(&s.engine, s.store, task("low", 9));
    monitor.process_pending().unwrap();
    assert_eq!(kept.notes().len(), 3);
    assert!(removed.notes().is_empty());
}

#[test]
fn subscriptions_receive_change_sets() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let seen: Rc<RefCell<Vec<ChangeSet>>> = Rc::default();
    let sink = seen.clone();
    let id = monitor.subscribe(move |changes| sink.borrow_mut().push(changes.clone()));

    let t4 = s
        .engine
        .perform(|tx| {
            let id = tx.insert(s.store, task("high", 2))?;
            tx.delete(s.t1)?;
            Ok(id)
        })
        .unwrap();
    monitor.process_pending().unwrap();

    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].inserted(), vec![t4]);
        assert_eq!(seen[0].deleted(), vec![s.t1]);
        assert_eq!(seen[0].current, monitor.snapshot());
    }

    assert!(monitor.unsubscribe(id));
    assert!(!monitor.unsubscribe(id));
    insert(&s.engine, s.store, task("high", 4));
    monitor.process_pending().unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn refetch_requests_collapse() {
    let s = seeded();
    let queue = ManualQueue::new();
    let monitor = ListMonitor::new(context(&s.engine, queue.clone()), tasks_by_priority(), MonitorOptions::new())
        .unwrap();
    let recorder = watch(&monitor);

    let low = QueryMutation::new().filter(Predicate::eq("priority", "low"));
    let high = QueryMutation::new().filter(Predicate::eq("priority", "high"));
    monitor.refetch(low).unwrap();
    monitor.refetch(high).unwrap();
    assert!(monitor.is_pending_refetch());
    assert_eq!(queue.pending(), 1);

    // Drive the chain: the first fetch completes, the second launches and completes.
    while monitor.is_pending_refetch() {
        queue.run_all();
        monitor.process_pending().unwrap();
    }

    assert_eq!(recorder.take(), vec![Note::WillRefetch, Note::DidRefetch]);
    assert_eq!(
        monitor.query(),
        tasks_by_priority().filter(Predicate::eq("priority", "high"))
    );
    assert_eq!(monitor.objects_in_all_sections(), vec![s.t2]);
    assert_eq!(s.engine.tracker_count(), 1);
}

struct RefetchOnChange {
    fired: Cell<bool>,
}

impl ListObserver<ListMonitor> for RefetchOnChange {
    fn list_will_change(&self, source: &ListMonitor) {
        if !self.fired.replace(true) {
            source.refetch(QueryMutation::new()).unwrap();
        }
    }
}

#[test]
fn refetch_waits_for_open_change_scope() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let recorder = watch(&monitor);
    let trigger = Rc::new(RefetchOnChange { fired: Cell::new(false) });
    monitor.add_list_observer(&trigger);

    let t4 = insert(&s.engine, s.store, task("high", 2));
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::WillRefetch,
            Note::Insert(t4, IndexPath::new(1, 0)),
            Note::DidChange,
            Note::DidRefetch,
        ]
    );
    assert!(!monitor.is_pending_refetch());
    assert_eq!(monitor.object_count(), 4);
}

#[test]
fn commits_during_refetch_are_not_lost() {
    let s = seeded();
    let queue = ManualQueue::new();
    let monitor = ListMonitor::new(context(&s.engine, queue.clone()), tasks_by_priority(), MonitorOptions::new())
        .unwrap();
    let recorder = watch(&monitor);
    monitor.refetch(QueryMutation::new()).unwrap();

    // Lands before the fetch runs: picked up by the fetch itself.
    let t4 = insert(&s.engine, s.store, task("high", 2));
    monitor.process_pending().unwrap();
    assert_eq!(recorder.notes(), vec![Note::WillRefetch]);

    queue.run_all();
    // Lands after the fetch ran but before its result is applied.
    let t5 = insert(&s.engine, s.store, task("low", 0));
    monitor.process_pending().unwrap();

    assert_eq!(
        recorder.take(),
        vec![
            Note::WillRefetch,
            Note::DidRefetch,
            Note::WillChange,
            Note::Insert(t5, IndexPath::new(0, 0)),
            Note::DidChange,
        ]
    );
    assert_eq!(monitor.objects_in_all_sections(), vec![t5, s.t1, s.t3, t4, s.t2]);
}

#[test]
fn topology_refetch_only_for_read_stores() {
    init_tracing();
    let engine = Arc::new(MemoryEngine::new());
    let a = engine.attach_store("a");
    let b = engine.attach_store("b");
    let c = engine.attach_store("c");
    let kept = insert(&engine, a, task("low", 1));
    insert(&engine, b, task("low", 2));
    insert(&engine, c, task("low", 3));

    let query = tasks_by_priority().from_stores([a, b]);
    let monitor =
        ListMonitor::new(context(&engine, Arc::new(InlineWorkQueue)), query, MonitorOptions::new()).unwrap();
    let recorder = watch(&monitor);
    assert_eq!(monitor.object_count(), 2);

    engine.detach_store(c).unwrap();
    monitor.process_pending().unwrap();
    assert!(recorder.notes().is_empty());

    engine.detach_store(b).unwrap();
    monitor.process_pending().unwrap();
    assert_eq!(recorder.take(), vec![Note::WillRefetch, Note::DidRefetch]);
    assert_eq!(monitor.objects_in_all_sections(), vec![kept]);

    // A store the query does not admit changes nothing.
    engine.attach_store("d");
    monitor.process_pending().unwrap();
    assert!(recorder.notes().is_empty());
}

#[test]
fn attaching_a_readable_store_refetches() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let recorder = watch(&monitor);

    s.engine.attach_store("extra");
    monitor.process_pending().unwrap();
    assert_eq!(recorder.take(), vec![Note::WillRefetch, Note::DidRefetch]);
    assert_eq!(monitor.object_count(), 3);
}

#[test]
fn fetch_failure_terminates_session() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let recorder = watch(&monitor);

    s.engine.set_fetch_failure(Some("disk on fire".into()));
    monitor.refetch(QueryMutation::new()).unwrap();
    let err = monitor.process_pending().unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }), "{err:?}");
    assert!(monitor.is_terminated());

    assert!(matches!(
        monitor.process_pending(),
        Err(Error::SessionTerminated { .. })
    ));
    assert!(matches!(
        monitor.refetch(QueryMutation::new()),
        Err(Error::SessionTerminated { .. })
    ));

    // The last snapshot stays readable; no further notifications arrive.
    assert_eq!(monitor.object_count(), 3);
    s.engine.set_fetch_failure(None);
    insert(&s.engine, s.store, task("low", 4));
    assert_eq!(recorder.take(), vec![Note::WillRefetch]);
}

#[test]
fn invalid_refetch_is_reported_as_fetch_failure() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    monitor.refetch(QueryMutation::new().batch_size(0)).unwrap();
    assert!(matches!(
        monitor.process_pending(),
        Err(Error::FetchFailed { .. })
    ));
}

#[test]
fn failed_construction_returns_error() {
    let s = seeded();
    s.engine.set_fetch_failure(Some("offline".into()));
    let err = ListMonitor::new(
        context(&s.engine, Arc::new(InlineWorkQueue)),
        tasks_by_priority(),
        MonitorOptions::new(),
    )
    .unwrap_err();
    assert_eq!(err, Error::fetch_failed("Task", "offline"));
}

#[test]
fn async_construction_calls_back_once_ready() {
    let s = seeded();
    let queue = ManualQueue::new();
    let seen = Rc::new(Cell::new(None));
    let cb = seen.clone();
    let monitor = ListMonitor::new_async(
        context(&s.engine, queue.clone()),
        tasks_by_priority(),
        MonitorOptions::new().label("async"),
        move |m| cb.set(Some(m.object_count())),
    );
    let recorder = watch(&monitor);

    assert_eq!(monitor.object_count(), 0);
    assert_eq!(monitor.process_pending().unwrap(), 0);
    assert_eq!(seen.get(), None);

    queue.run_all();
    let t4 = insert(&s.engine, s.store, task("high", 2));
    monitor.process_pending().unwrap();

    assert_eq!(seen.get(), Some(3));
    assert_eq!(monitor.object_count(), 4);
    assert_eq!(
        recorder.take(),
        vec![
            Note::WillChange,
            Note::Insert(t4, IndexPath::new(1, 0)),
            Note::DidChange
        ]
    );
}

#[test]
fn async_construction_failure_skips_callback() {
    let s = seeded();
    s.engine.set_fetch_failure(Some("offline".into()));
    let called = Rc::new(Cell::new(false));
    let cb = called.clone();
    let monitor = ListMonitor::new_async(
        context(&s.engine, Arc::new(InlineWorkQueue)),
        tasks_by_priority(),
        MonitorOptions::new(),
        move |_| cb.set(true),
    );
    assert!(matches!(
        monitor.process_pending(),
        Err(Error::FetchFailed { .. })
    ));
    assert!(!called.get());
}

#[test]
fn asynchronous_initial_fetch_option() {
    let s = seeded();
    let options = MonitorOptions::new().initial_fetch(InitialFetch::Asynchronous);
    let monitor = ListMonitor::new(context(&s.engine, Arc::new(InlineWorkQueue)), tasks_by_priority(), options)
        .unwrap();
    assert!(!monitor.has_objects());
    assert_eq!(monitor.process_pending().unwrap(), 1);
    assert_eq!(monitor.object_count(), 3);
}

#[test]
fn monitors_compare_by_session() {
    let s = seeded();
    let a = inline_monitor(&s, tasks_by_priority());
    let b = inline_monitor(&s, tasks_by_priority());
    assert_eq!(a, a.clone());
    assert_ne!(a, b);

    let set: HashSet<ListMonitor> = [a.clone(), b.clone(), a.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&a) && set.contains(&b));
}

#[test]
fn dropped_monitor_disconnects_from_engine() {
    let s = seeded();
    let monitor = inline_monitor(&s, tasks_by_priority());
    let sender = monitor.control_sender();
    assert!(!sender.is_closed());
    assert_eq!(s.engine.tracker_count(), 1);

    drop(monitor);
    assert!(sender.is_closed());
    assert_eq!(s.engine.tracker_count(), 0);
    insert(&s.engine, s.store, task("low", 8));
}

#[tokio::test]
async fn refetch_on_blocking_pool() {
    let s = seeded();
    let monitor = ListMonitor::new(
        context(&s.engine, Arc::new(TokioWorkQueue::current())),
        tasks_by_priority(),
        MonitorOptions::new(),
    )
    .unwrap();
    let recorder = watch(&monitor);

    monitor
        .refetch(QueryMutation::new().filter(Predicate::eq("priority", "low")))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while monitor.is_pending_refetch() {
            monitor.process_next().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(recorder.take(), vec![Note::WillRefetch, Note::DidRefetch]);
    assert_eq!(monitor.objects_in_all_sections(), vec![s.t1, s.t3]);

    let engine = s.engine.clone();
    let store = s.store;
    let t4 = tokio::task::spawn_blocking(move || insert(&engine, store, task("low", 2)))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), monitor.process_next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(monitor.objects_in_all_sections(), vec![s.t1, t4, s.t3]);
}
