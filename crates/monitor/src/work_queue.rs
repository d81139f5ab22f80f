//! Where fetches run.

use std::fmt;
use tokio::runtime::Handle;

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes fetch jobs off the control thread.
///
/// Jobs only touch the engine and a `ControlSender`; results come back through the
/// monitor's mailbox.
pub trait WorkQueue: Send + Sync {
    fn submit(&self, job: Job);
}

/// Runs jobs on a tokio runtime's blocking pool.
#[derive(Clone)]
pub struct TokioWorkQueue {
    handle: Handle,
}

impl TokioWorkQueue {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Like [`TokioWorkQueue::current`], but returns `None` outside a runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl WorkQueue for TokioWorkQueue {
    fn submit(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

impl fmt::Debug for TokioWorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioWorkQueue").finish_non_exhaustive()
    }
}

/// Runs each job immediately on the submitting thread.
///
/// The result still travels through the mailbox, so it is applied on the next drain.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineWorkQueue;

impl WorkQueue for InlineWorkQueue {
    fn submit(&self, job: Job) {
        job();
    }
}
