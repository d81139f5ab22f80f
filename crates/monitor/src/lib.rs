//! Vigil Monitor - live, sectioned views over query results.
//!
//! A `ListMonitor` holds the current result of a `QueryDefinition` as a sectioned
//! snapshot and keeps it up to date while the underlying stores change. Registered
//! observers receive bracketed notifications: will-change, row and section deltas,
//! did-change; and will-refetch / did-refetch around query changes.
//!
//! # Threading
//!
//! A monitor belongs to the thread that created it. Fetches run on a `WorkQueue`;
//! their results, live signals and store attach/detach events are posted to the
//! monitor's mailbox and applied when the owner calls `process_pending` or awaits
//! `process_next`.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use vigil_core::{IndexPath, Record, RecordId};
//! use vigil_monitor::{
//!     InlineWorkQueue, ListMonitor, ListObjectObserver, ListObserver, MonitorContext, MonitorOptions,
//! };
//! use vigil_query::QueryDefinition;
//! use vigil_storage::MemoryEngine;
//!
//! #[derive(Default)]
//! struct Inserts(Cell<usize>);
//!
//! impl ListObserver<ListMonitor> for Inserts {}
//! impl ListObjectObserver<ListMonitor> for Inserts {
//!     fn did_insert_object(&self, _: &ListMonitor, _: RecordId, _: IndexPath) {
//!         self.0.set(self.0.get() + 1);
//!     }
//! }
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let store = engine.attach_store("main");
//! let context = MonitorContext::new(engine.clone(), Arc::new(InlineWorkQueue)).with_topology(engine.clone());
//! let monitor = ListMonitor::new(context, QueryDefinition::new("Task"), MonitorOptions::new()).unwrap();
//!
//! let inserts = Rc::new(Inserts::default());
//! monitor.add_object_observer(&inserts);
//!
//! engine.perform(|tx| tx.insert(store, Record::draft("Task"))).unwrap();
//! monitor.process_pending().unwrap();
//! assert_eq!(inserts.0.get(), 1);
//! ```

pub mod control;
pub mod coordinator;
pub mod monitor;
pub mod options;
pub mod topology;
pub mod work_queue;

pub use control::ControlSender;
pub use coordinator::{Completion, Launch, RefetchCoordinator, RefetchState, RefetchTrigger};
pub use monitor::{ListMonitor, MonitorContext};
pub use options::{InitialFetch, MonitorOptions};
pub use topology::TopologyListener;
pub use work_queue::{InlineWorkQueue, Job, TokioWorkQueue, WorkQueue};

pub use vigil_reactive::{ChangeSet, ListObjectObserver, ListObserver, ListSectionObserver, SubscriptionId};
