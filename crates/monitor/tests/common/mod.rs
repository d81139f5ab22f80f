//! Shared fixtures for monitor integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use vigil_core::{IndexPath, Record, RecordId, StoreId, Value};
use vigil_monitor::{
    Job, ListMonitor, ListObjectObserver, ListObserver, ListSectionObserver, MonitorContext, WorkQueue,
};
use vigil_query::{QueryDefinition, Section, SectionBy, SortDescriptor};
use vigil_storage::MemoryEngine;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Holds submitted jobs until the test runs them.
#[derive(Default)]
pub struct ManualQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl ManualQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs queued jobs, oldest first, until none is left.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.jobs.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(job) = job else {
                return ran;
            };
            job();
            ran += 1;
        }
    }
}

impl WorkQueue for ManualQueue {
    fn submit(&self, job: Job) {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).push_back(job);
    }
}

/// One observed notification.
#[derive(Clone, Debug, PartialEq)]
pub enum Note {
    WillChange,
    DidChange,
    WillRefetch,
    DidRefetch,
    Insert(RecordId, IndexPath),
    Delete(RecordId, IndexPath),
    Update(RecordId, IndexPath),
    Move(RecordId, IndexPath, IndexPath),
    InsertSection(String, usize),
    DeleteSection(String, usize),
}

impl Note {
    pub fn is_delta(&self) -> bool {
        !matches!(self, Note::WillChange | Note::DidChange | Note::WillRefetch | Note::DidRefetch)
    }
}

/// Records every notification it receives.
#[derive(Default)]
pub struct Recorder {
    notes: RefCell<Vec<Note>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<Note> {
        self.notes.take()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }

    pub fn count(&self, note: &Note) -> usize {
        self.notes.borrow().iter().filter(|n| *n == note).count()
    }

    fn push(&self, note: Note) {
        self.notes.borrow_mut().push(note);
    }
}

impl ListObserver<ListMonitor> for Recorder {
    fn list_will_change(&self, _: &ListMonitor) {
        self.push(Note::WillChange);
    }

    fn list_did_change(&self, _: &ListMonitor) {
        self.push(Note::DidChange);
    }

    fn list_will_refetch(&self, _: &ListMonitor) {
        self.push(Note::WillRefetch);
    }

    fn list_did_refetch(&self, _: &ListMonitor) {
        self.push(Note::DidRefetch);
    }
}

impl ListObjectObserver<ListMonitor> for Recorder {
    fn did_insert_object(&self, _: &ListMonitor, record: RecordId, to: IndexPath) {
        self.push(Note::Insert(record, to));
    }

    fn did_delete_object(&self, _: &ListMonitor, record: RecordId, from: IndexPath) {
        self.push(Note::Delete(record, from));
    }

    fn did_update_object(&self, _: &ListMonitor, record: RecordId, at: IndexPath) {
        self.push(Note::Update(record, at));
    }

    fn did_move_object(&self, _: &ListMonitor, record: RecordId, from: IndexPath, to: IndexPath) {
        self.push(Note::Move(record, from, to));
    }
}

impl ListSectionObserver<ListMonitor> for Recorder {
    fn did_insert_section(&self, _: &ListMonitor, section: &Section, to: usize) {
        self.push(Note::InsertSection(section.name().to_string(), to));
    }

    fn did_delete_section(&self, _: &ListMonitor, section: &Section, from: usize) {
        self.push(Note::DeleteSection(section.name().to_string(), from));
    }
}

pub fn task(priority: &str, due: i64) -> Record {
    Record::draft("Task")
        .with_field("priority", priority)
        .with_field("due", Value::DateTime(due))
}

/// Tasks sectioned by priority (descending), ordered by due date.
pub fn tasks_by_priority() -> QueryDefinition {
    QueryDefinition::new("Task")
        .section_by(SectionBy::new("priority").descending())
        .order_by(SortDescriptor::asc("due"))
}

pub fn context(engine: &Arc<MemoryEngine>, queue: Arc<dyn WorkQueue>) -> MonitorContext {
    MonitorContext::new(engine.clone(), queue).with_topology(engine.clone())
}

pub fn insert(engine: &MemoryEngine, store: StoreId, record: Record) -> RecordId {
    engine.perform(|tx| tx.insert(store, record)).unwrap()
}
