//! The monitor's mailbox.
//!
//! Everything that happens off the control thread reaches the monitor as a
//! `ControlMessage` posted through a `ControlSender`. The monitor applies messages
//! only when its owner drains the mailbox.

use hashbrown::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use vigil_core::{Result, StoreId};
use vigil_query::{LiveSignal, LiveSink, QueryDefinition, Snapshot, TopologyEvent, TopologySink, TrackedQuery};

/// Output of a background fetch.
pub(crate) struct Fetched {
    pub snapshot: Snapshot,
    pub tracker: Arc<dyn TrackedQuery>,
    pub affected: HashSet<StoreId>,
}

pub(crate) enum ControlMessage {
    /// A signal from the tracker created by fetch `ticket`.
    Live { ticket: u64, signal: LiveSignal },
    Topology(TopologyEvent),
    FetchCompleted { ticket: u64, result: Result<Fetched> },
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Live { ticket, signal } => {
                f.debug_struct("Live").field("ticket", ticket).field("signal", signal).finish()
            }
            ControlMessage::Topology(event) => f.debug_tuple("Topology").field(event).finish(),
            ControlMessage::FetchCompleted { ticket, result } => f
                .debug_struct("FetchCompleted")
                .field("ticket", ticket)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

/// Sending half of a monitor's mailbox. `Send + Sync + Clone`.
///
/// Posting never blocks. Once the monitor is dropped every post returns false.
#[derive(Clone)]
pub struct ControlSender {
    tx: UnboundedSender<ControlMessage>,
    notify: Arc<Notify>,
}

impl ControlSender {
    pub(crate) fn post(&self, message: ControlMessage) -> bool {
        let sent = self.tx.send(message).is_ok();
        if sent {
            self.notify.notify_one();
        }
        sent
    }

    /// Returns true once the monitor has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns a live sink that tags every signal with `ticket`.
    pub(crate) fn live_sink(&self, ticket: u64) -> Arc<dyn LiveSink> {
        Arc::new(LiveChannel {
            sender: self.clone(),
            ticket,
        })
    }

    /// Runs `query` through a fresh tracker and posts the outcome as fetch `ticket`.
    pub(crate) fn fetch_job(
        &self,
        engine: Arc<dyn vigil_query::QueryEngine>,
        query: QueryDefinition,
        ticket: u64,
    ) -> crate::work_queue::Job {
        let sender = self.clone();
        Box::new(move || {
            let result = fetch(&*engine, &sender, &query, ticket);
            if !sender.post(ControlMessage::FetchCompleted { ticket, result }) {
                tracing::debug!(ticket, "monitor dropped before fetch completed");
            }
        })
    }
}

impl fmt::Debug for ControlSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSender").field("closed", &self.is_closed()).finish()
    }
}

impl TopologySink for ControlSender {
    fn send_topology(&self, event: TopologyEvent) -> bool {
        self.post(ControlMessage::Topology(event))
    }
}

struct LiveChannel {
    sender: ControlSender,
    ticket: u64,
}

impl LiveSink for LiveChannel {
    fn send_signal(&self, signal: LiveSignal) -> bool {
        self.sender.post(ControlMessage::Live {
            ticket: self.ticket,
            signal,
        })
    }
}

/// Tracks and fetches `query`. Runs on whichever thread calls it.
pub(crate) fn fetch(
    engine: &dyn vigil_query::QueryEngine,
    sender: &ControlSender,
    query: &QueryDefinition,
    ticket: u64,
) -> Result<Fetched> {
    let tracker = engine.track(sender.live_sink(ticket));
    let snapshot = tracker.fetch(query)?;
    Ok(Fetched {
        snapshot,
        tracker,
        affected: engine.affected_stores(query),
    })
}

/// Receiving half, owned by the monitor.
pub(crate) struct Mailbox {
    rx: UnboundedReceiver<ControlMessage>,
}

impl Mailbox {
    pub fn try_next(&mut self) -> Option<ControlMessage> {
        self.rx.try_recv().ok()
    }
}

/// Creates a mailbox and its sender, sharing `notify` for wakeups.
pub(crate) fn channel(notify: Arc<Notify>) -> (ControlSender, Mailbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender { tx, notify }, Mailbox { rx })
}
