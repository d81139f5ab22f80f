//! The live list monitor.

use crate::control::{self, ControlMessage, ControlSender, Fetched, Mailbox};
use crate::coordinator::{Completion, Launch, RefetchCoordinator, RefetchTrigger};
use crate::options::{InitialFetch, MonitorOptions};
use crate::topology::TopologyListener;
use crate::work_queue::WorkQueue;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::Span;
use vigil_core::{Error, IndexPath, RecordId, Result};
use vigil_query::{
    LiveSignal, QueryDefinition, QueryEngine, QueryMutation, Section, Snapshot, StoreTopology, TopologyEvent,
    TrackedQuery,
};
use vigil_reactive::{
    ChangeCollector, ChangeSet, CollectorStep, ListObjectObserver, ListObserver, ListSectionObserver,
    ObserverRegistry, SubscriptionId, SubscriptionManager,
};

/// Ticket of the construction fetch. Refetches are numbered from 1.
const INITIAL_TICKET: u64 = 0;

/// Collaborators handed to a monitor at construction.
#[derive(Clone)]
pub struct MonitorContext {
    engine: Arc<dyn QueryEngine>,
    topology: Option<Arc<dyn StoreTopology>>,
    queue: Arc<dyn WorkQueue>,
}

impl MonitorContext {
    pub fn new(engine: Arc<dyn QueryEngine>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            engine,
            topology: None,
            queue,
        }
    }

    /// Subscribes monitors built from this context to store attach/detach events.
    pub fn with_topology(mut self, topology: Arc<dyn StoreTopology>) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }
}

impl fmt::Debug for MonitorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorContext")
            .field("topology", &self.topology.is_some())
            .finish_non_exhaustive()
    }
}

type ReadyCallback = Box<dyn FnOnce(&ListMonitor)>;

/// Control-thread state of one monitor.
struct Session {
    query: QueryDefinition,
    snapshot: Snapshot,
    collector: ChangeCollector,
    coordinator: RefetchCoordinator,
    topology: TopologyListener,
    /// Keeps the live subscription of the installed fetch alive.
    tracker: Option<Arc<dyn TrackedQuery>>,
    installed: Option<u64>,
    /// Ticket of an asynchronous construction fetch still in flight.
    loading: Option<u64>,
    /// Signals of the newest fetch that arrived while dispatch was disabled.
    deferred: Vec<LiveSignal>,
    terminated: Option<Error>,
}

impl Session {
    /// The fetch whose signals describe the newest data.
    fn current_ticket(&self) -> Option<u64> {
        self.coordinator.running().or(self.loading).or(self.installed)
    }

    fn is_drained(&self) -> bool {
        self.collector.scope().is_drained()
    }

    fn install(&mut self, ticket: u64, fetched: Fetched) {
        self.snapshot = fetched.snapshot;
        self.tracker = Some(fetched.tracker);
        self.topology.reset(fetched.affected);
        self.installed = Some(ticket);
    }
}

struct Inner {
    span: Span,
    context: MonitorContext,
    sender: ControlSender,
    notify: Arc<Notify>,
    mailbox: RefCell<Mailbox>,
    session: RefCell<Session>,
    observers: ObserverRegistry<ListMonitor>,
    subscriptions: RefCell<SubscriptionManager>,
    on_ready: RefCell<Option<ReadyCallback>>,
}

/// A live, sectioned view of a query's result.
///
/// The monitor owns a snapshot of the result and keeps it current: engine commits,
/// store attach/detach and completed refetches arrive in its mailbox and are applied,
/// and observers notified, when the owning thread drains it with
/// [`process_pending`](ListMonitor::process_pending) or
/// [`process_next`](ListMonitor::process_next).
///
/// `ListMonitor` is a cheap handle. Clones share one session, and two handles are
/// equal only if they do. It is neither `Send` nor `Sync`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vigil_core::Record;
/// use vigil_monitor::{InlineWorkQueue, ListMonitor, MonitorContext, MonitorOptions};
/// use vigil_query::{QueryDefinition, SortDescriptor};
/// use vigil_storage::MemoryEngine;
///
/// let engine = Arc::new(MemoryEngine::new());
/// let store = engine.attach_store("main");
/// let context = MonitorContext::new(engine.clone(), Arc::new(InlineWorkQueue));
/// let query = QueryDefinition::new("Task").order_by(SortDescriptor::asc("title"));
/// let monitor = ListMonitor::new(context, query, MonitorOptions::new()).unwrap();
/// assert!(!monitor.has_objects());
///
/// let id = engine
///     .perform(|tx| tx.insert(store, Record::draft("Task").with_field("title", "write docs")))
///     .unwrap();
/// monitor.process_pending().unwrap();
/// assert_eq!(monitor.object_at(0), id);
/// ```
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<vigil_monitor::ListMonitor>();
/// ```
#[derive(Clone)]
pub struct ListMonitor {
    inner: Rc<Inner>,
}

impl ListMonitor {
    /// Creates a monitor using the initial fetch mode in `options`.
    ///
    /// A synchronous initial fetch that fails is returned as the error.
    pub fn new(context: MonitorContext, query: QueryDefinition, options: MonitorOptions) -> Result<Self> {
        match options.get_initial_fetch() {
            InitialFetch::Synchronous => Self::fetch_now(context, query, options),
            InitialFetch::Asynchronous => Ok(Self::fetch_later(context, query, options, None)),
        }
    }

    /// Creates a monitor whose initial fetch runs on the work queue.
    ///
    /// `on_ready` runs on the owning thread once the result is installed and no change
    /// scope is open. It never runs if the fetch fails.
    pub fn new_async<F>(context: MonitorContext, query: QueryDefinition, options: MonitorOptions, on_ready: F) -> Self
    where
        F: FnOnce(&ListMonitor) + 'static,
    {
        Self::fetch_later(context, query, options, Some(Box::new(on_ready)))
    }

    fn create(context: MonitorContext, query: QueryDefinition, options: &MonitorOptions) -> Self {
        let notify = Arc::new(Notify::new());
        let (sender, mailbox) = control::channel(notify.clone());
        let span = tracing::debug_span!("list_monitor", label = %options.get_label());

        let effective = context.engine.affected_stores(&query);
        if let Some(topology) = &context.topology {
            topology.subscribe_topology(Arc::new(sender.clone()));
        }

        let session = Session {
            query,
            snapshot: Snapshot::default(),
            collector: ChangeCollector::new(),
            coordinator: RefetchCoordinator::new(INITIAL_TICKET + 1),
            topology: TopologyListener::new(effective),
            tracker: None,
            installed: None,
            loading: None,
            deferred: Vec::new(),
            terminated: None,
        };
        Self {
            inner: Rc::new(Inner {
                span,
                context,
                sender,
                notify,
                mailbox: RefCell::new(mailbox),
                session: RefCell::new(session),
                observers: ObserverRegistry::new(),
                subscriptions: RefCell::new(SubscriptionManager::new()),
                on_ready: RefCell::new(None),
            }),
        }
    }

    fn fetch_now(context: MonitorContext, query: QueryDefinition, options: MonitorOptions) -> Result<Self> {
        let monitor = Self::create(context, query.clone(), &options);
        {
            let _entered = monitor.inner.span.enter();
            let fetched = control::fetch(&*monitor.inner.context.engine, &monitor.inner.sender, &query, INITIAL_TICKET)
                .map_err(|err| {
                    tracing::error!(%err, "initial fetch failed");
                    err
                })?;
            tracing::debug!(objects = fetched.snapshot.len(), "initial fetch installed");
            monitor.session_mut().install(INITIAL_TICKET, fetched);
        }
        Ok(monitor)
    }

    fn fetch_later(
        context: MonitorContext,
        query: QueryDefinition,
        options: MonitorOptions,
        on_ready: Option<ReadyCallback>,
    ) -> Self {
        let monitor = Self::create(context, query.clone(), &options);
        {
            let mut session = monitor.session_mut();
            session.loading = Some(INITIAL_TICKET);
            session.collector.disable();
        }
        *monitor.inner.on_ready.borrow_mut() = on_ready;

        {
            let inner = &monitor.inner;
            let _entered = inner.span.enter();
            tracing::debug!("submitting initial fetch");
            let job = inner.sender.fetch_job(inner.context.engine.clone(), query, INITIAL_TICKET);
            inner.context.queue.submit(job);
        }
        monitor
    }

    fn session(&self) -> Ref<'_, Session> {
        self.inner.session.borrow()
    }

    fn session_mut(&self) -> RefMut<'_, Session> {
        self.inner.session.borrow_mut()
    }

    // ---- Snapshot access ----

    /// Returns the installed snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.session().snapshot.clone()
    }

    /// Returns the query the installed (or in-flight) fetch runs.
    pub fn query(&self) -> QueryDefinition {
        self.session().query.clone()
    }

    pub fn object_count(&self) -> usize {
        self.session().snapshot.len()
    }

    pub fn section_count(&self) -> usize {
        self.session().snapshot.section_count()
    }

    /// Returns the record at flat position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= object_count()`.
    pub fn object_at(&self, index: usize) -> RecordId {
        let session = self.session();
        match session.snapshot.record_at(index) {
            Some(id) => id,
            None => panic!(
                "object index {} out of range for {} objects",
                index,
                session.snapshot.len()
            ),
        }
    }

    pub fn safe_object_at(&self, index: usize) -> Option<RecordId> {
        self.session().snapshot.record_at(index)
    }

    /// Returns the record at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the section, then the item, is out of range.
    pub fn object_at_path(&self, path: IndexPath) -> RecordId {
        let session = self.session();
        let section = section_or_panic(&session.snapshot, path.section);
        match section.get(path.item) {
            Some(id) => id,
            None => panic!(
                "item {} out of range for section {} with {} objects",
                path.item,
                path.section,
                section.len()
            ),
        }
    }

    pub fn safe_object_at_path(&self, path: IndexPath) -> Option<RecordId> {
        self.session().snapshot.record_at_path(path)
    }

    /// # Panics
    ///
    /// Panics if `index >= section_count()`.
    pub fn section_at(&self, index: usize) -> Section {
        section_or_panic(&self.session().snapshot, index).clone()
    }

    pub fn safe_section_at(&self, index: usize) -> Option<Section> {
        self.session().snapshot.section(index).cloned()
    }

    pub fn index_of(&self, record: RecordId) -> Option<usize> {
        self.session().snapshot.index_of(record)
    }

    pub fn path_of(&self, record: RecordId) -> Option<IndexPath> {
        self.session().snapshot.path_of(record)
    }

    pub fn has_sections(&self) -> bool {
        self.section_count() > 0
    }

    pub fn has_objects(&self) -> bool {
        self.object_count() > 0
    }

    /// False for a section that does not exist.
    pub fn has_objects_in_section(&self, section: usize) -> bool {
        self.safe_number_of_objects_in_section(section)
            .is_some_and(|n| n > 0)
    }

    /// All records in display order.
    pub fn objects_in_all_sections(&self) -> Vec<RecordId> {
        self.session().snapshot.iter().collect()
    }

    /// # Panics
    ///
    /// Panics if `section >= section_count()`.
    pub fn objects_in_section(&self, section: usize) -> Vec<RecordId> {
        section_or_panic(&self.session().snapshot, section).records().to_vec()
    }

    pub fn safe_objects_in_section(&self, section: usize) -> Option<Vec<RecordId>> {
        self.session()
            .snapshot
            .section(section)
            .map(|s| s.records().to_vec())
    }

    /// # Panics
    ///
    /// Panics if `section >= section_count()`.
    pub fn number_of_objects_in_section(&self, section: usize) -> usize {
        section_or_panic(&self.session().snapshot, section).len()
    }

    pub fn safe_number_of_objects_in_section(&self, section: usize) -> Option<usize> {
        self.session().snapshot.section(section).map(Section::len)
    }

    pub fn sections(&self) -> Vec<Section> {
        self.session().snapshot.sections().to_vec()
    }

    pub fn section_index_titles(&self) -> Vec<String> {
        self.session()
            .snapshot
            .section_index_titles()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Maps an index title, or its position in `section_index_titles()`, to a section.
    pub fn target_section_for_index_title(&self, title: &str, index: usize) -> Option<usize> {
        self.session().snapshot.target_section_for_index_title(title, index)
    }

    /// True from will-refetch until the matching did-refetch.
    pub fn is_pending_refetch(&self) -> bool {
        self.session().coordinator.is_pending()
    }

    /// True once a fetch failure ended the session.
    pub fn is_terminated(&self) -> bool {
        self.session().terminated.is_some()
    }

    /// Returns a handle that posts into this monitor's mailbox from any thread.
    pub fn control_sender(&self) -> ControlSender {
        self.inner.sender.clone()
    }

    // ---- Observers ----

    /// Registers for list notifications. Re-adding replaces the previous registration.
    pub fn add_list_observer<O>(&self, observer: &Rc<O>)
    where
        O: ListObserver<ListMonitor> + 'static,
    {
        self.inner.observers.add_list(observer);
    }

    /// Registers for list and row notifications.
    pub fn add_object_observer<O>(&self, observer: &Rc<O>)
    where
        O: ListObjectObserver<ListMonitor> + 'static,
    {
        self.inner.observers.add_object(observer);
    }

    /// Registers for list, row and section notifications.
    pub fn add_section_observer<O>(&self, observer: &Rc<O>)
    where
        O: ListSectionObserver<ListMonitor> + 'static,
    {
        self.inner.observers.add_section(observer);
    }

    /// Unregisters `observer` from every tier. Returns true if it was registered.
    pub fn remove_observer<O: ?Sized>(&self, observer: &Rc<O>) -> bool {
        self.inner.observers.remove(observer)
    }

    /// Calls `callback` with every completed batch of changes, after did-change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + 'static,
    {
        self.inner.subscriptions.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.borrow_mut().unsubscribe(id)
    }

    // ---- Refetch ----

    /// Requests a refetch with `mutation` applied to the query.
    ///
    /// The fetch launches once no change scope is open. Requests made before it
    /// launches replace each other; a request made while it runs queues one more
    /// fetch. Observers see a single will-refetch/did-refetch pair either way.
    pub fn refetch(&self, mutation: QueryMutation) -> Result<()> {
        let _entered = self.inner.span.enter();
        self.ensure_live()?;
        self.request_refetch(RefetchTrigger::User(mutation));
        Ok(())
    }

    // ---- Mailbox ----

    /// Applies every message waiting in the mailbox. Returns how many were applied.
    ///
    /// A failed fetch is returned once as `Error::FetchFailed`; afterwards every call
    /// returns `Error::SessionTerminated`.
    pub fn process_pending(&self) -> Result<usize> {
        let _entered = self.inner.span.enter();
        let mut handled = 0;
        loop {
            self.ensure_live()?;
            let next = self.inner.mailbox.borrow_mut().try_next();
            let Some(message) = next else {
                break;
            };
            handled += 1;
            self.handle(message)?;
        }
        Ok(handled)
    }

    /// Waits until at least one message arrives, then applies everything waiting.
    pub async fn process_next(&self) -> Result<usize> {
        loop {
            let handled = self.process_pending()?;
            if handled > 0 {
                return Ok(handled);
            }
            self.inner.notify.notified().await;
        }
    }

    fn ensure_live(&self) -> Result<()> {
        match &self.session().terminated {
            Some(err) => Err(Error::session_terminated(err.to_string())),
            None => Ok(()),
        }
    }

    fn handle(&self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::Live { ticket, signal } => self.route_signal(ticket, signal),
            ControlMessage::Topology(event) => self.apply_topology(event),
            ControlMessage::FetchCompleted { ticket, result } => return self.complete_fetch(ticket, result),
        }
        Ok(())
    }

    fn route_signal(&self, ticket: u64, signal: LiveSignal) {
        {
            let mut session = self.session_mut();
            if session.current_ticket() != Some(ticket) {
                tracing::trace!(ticket, "dropping signal from superseded fetch");
                return;
            }
            if !session.collector.is_enabled() {
                session.deferred.push(signal);
                return;
            }
        }
        self.apply_signal(signal);
    }

    fn apply_signal(&self, signal: LiveSignal) {
        let step = self.session_mut().collector.accept(signal);
        match step {
            CollectorStep::Ignored | CollectorStep::Nested => {}
            CollectorStep::WillChange => self.inner.observers.dispatch_list(|o| o.list_will_change(self)),
            CollectorStep::Delta(event) => self.inner.observers.dispatch_event(self, &event),
            CollectorStep::Install { snapshot, completed } => {
                self.session_mut().snapshot = snapshot;
                if let Some(changes) = completed {
                    self.inner.observers.dispatch_list(|o| o.list_did_change(self));
                    self.notify_subscribers(&changes);
                    self.advance();
                }
            }
        }
    }

    fn notify_subscribers(&self, changes: &ChangeSet) {
        let callbacks = self.inner.subscriptions.borrow().callbacks();
        for callback in callbacks {
            callback(changes);
        }
    }

    fn apply_topology(&self, event: TopologyEvent) {
        let needed = {
            let mut guard = self.session_mut();
            let session = &mut *guard;
            match &event {
                TopologyEvent::StoresWillChange { removed } => session
                    .topology
                    .will_change(removed, session.collector.scope_mut()),
                TopologyEvent::StoresDidChange { added, removed } => {
                    let pending = session.coordinator.is_pending();
                    let query = &session.query;
                    session.topology.did_change(
                        added,
                        removed,
                        |id| query.admits_store(id),
                        pending,
                        session.collector.scope_mut(),
                    )
                }
            }
        };
        if needed {
            self.request_refetch(RefetchTrigger::Topology);
        } else {
            self.advance();
        }
    }

    fn request_refetch(&self, trigger: RefetchTrigger) {
        let starts = self.session_mut().coordinator.request(trigger);
        if starts {
            tracing::debug!("refetch requested");
            self.inner.observers.dispatch_list(|o| o.list_will_refetch(self));
        } else {
            tracing::debug!("refetch already pending");
        }
        self.advance();
    }

    fn complete_fetch(&self, ticket: u64, result: Result<Fetched>) -> Result<()> {
        if self.session().loading == Some(ticket) {
            return self.complete_initial(ticket, result);
        }
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                if self.session_mut().coordinator.abort(ticket) {
                    return Err(self.terminate(err));
                }
                tracing::debug!(ticket, %err, "ignoring failure of superseded fetch");
                return Ok(());
            }
        };

        let completion = self.session_mut().coordinator.complete(ticket);
        match completion {
            Completion::Stale => tracing::trace!(ticket, "discarding superseded fetch"),
            Completion::Continue | Completion::Settled => {
                tracing::debug!(
                    ticket,
                    objects = fetched.snapshot.len(),
                    chained = completion == Completion::Continue,
                    "fetch installed"
                );
                self.session_mut().install(ticket, fetched);
            }
        }
        self.advance();
        Ok(())
    }

    fn complete_initial(&self, ticket: u64, result: Result<Fetched>) -> Result<()> {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                self.session_mut().loading = None;
                return Err(self.terminate(err));
            }
        };
        tracing::debug!(objects = fetched.snapshot.len(), "initial fetch installed");
        let replay = {
            let mut session = self.session_mut();
            session.loading = None;
            session.install(ticket, fetched);
            // A refetch requested meanwhile covers everything deferred.
            if session.coordinator.is_pending() {
                session.deferred.clear();
            } else {
                session.collector.enable();
            }
            mem::take(&mut session.deferred)
        };
        self.replay(replay);
        self.advance();
        Ok(())
    }

    fn replay(&self, signals: Vec<LiveSignal>) {
        for signal in signals {
            self.apply_signal(signal);
        }
    }

    /// Runs work that waits for a drained change scope.
    fn advance(&self) {
        if self.session().terminated.is_some() {
            return;
        }
        self.try_launch();
        self.try_finish_refetch();
        self.try_ready();
    }

    fn try_launch(&self) {
        let launch = {
            let mut session = self.session_mut();
            let ready = session.is_drained() && session.loading.is_none();
            session.coordinator.try_launch(ready)
        };
        let Some(Launch { ticket, mutation }) = launch else {
            return;
        };

        let query = {
            let mut session = self.session_mut();
            session.collector.disable();
            session.deferred.clear();
            session.query = session.query.mutated(&mutation);
            session.query.clone()
        };
        tracing::debug!(ticket, "launching refetch");
        let job = self
            .inner
            .sender
            .fetch_job(self.inner.context.engine.clone(), query, ticket);
        self.inner.context.queue.submit(job);
    }

    fn try_finish_refetch(&self) {
        let replay = {
            let mut session = self.session_mut();
            let drained = session.is_drained();
            if !session.coordinator.try_finish(drained) {
                return;
            }
            session.collector.enable();
            mem::take(&mut session.deferred)
        };
        tracing::debug!(deferred = replay.len(), "refetch complete");
        self.inner.observers.dispatch_list(|o| o.list_did_refetch(self));
        self.replay(replay);
    }

    fn try_ready(&self) {
        if self.inner.on_ready.borrow().is_none() {
            return;
        }
        {
            let session = self.session();
            if session.loading.is_some() || !session.is_drained() {
                return;
            }
        }
        let callback = self.inner.on_ready.borrow_mut().take();
        if let Some(callback) = callback {
            tracing::debug!("monitor ready");
            callback(self);
        }
    }

    /// Ends the session after a failed fetch and returns the error to report.
    fn terminate(&self, err: Error) -> Error {
        let mut session = self.session_mut();
        let err = match err {
            err @ Error::FetchFailed { .. } => err,
            other => Error::fetch_failed(session.query.entity(), other.to_string()),
        };
        tracing::error!(%err, "fetch failed, terminating monitor session");
        session.collector.disable();
        session.tracker = None;
        session.deferred.clear();
        session.terminated = Some(err.clone());
        drop(session);
        self.inner.on_ready.borrow_mut().take();
        err
    }
}

fn section_or_panic(snapshot: &Snapshot, index: usize) -> &Section {
    match snapshot.section(index) {
        Some(section) => section,
        None => panic!(
            "section index {} out of range for {} sections",
            index,
            snapshot.section_count()
        ),
    }
}

impl PartialEq for ListMonitor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ListMonitor {}

impl Hash for ListMonitor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for ListMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(session) = self.inner.session.try_borrow() else {
            return f.debug_struct("ListMonitor").finish_non_exhaustive();
        };
        f.debug_struct("ListMonitor")
            .field("entity", &session.query.entity())
            .field("objects", &session.snapshot.len())
            .field("sections", &session.snapshot.section_count())
            .field("pending_refetch", &session.coordinator.is_pending())
            .field("terminated", &session.terminated.is_some())
            .finish()
    }
}
