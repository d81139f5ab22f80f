//! Single-flight refetch state machine.
//!
//! At most one fetch runs at a time. Requests that arrive while one is queued or
//! running collapse into a single pending mutation, so observers see one
//! will-refetch/did-refetch pair for the whole chain.

use vigil_query::QueryMutation;

/// Why a refetch was requested.
#[derive(Clone, Debug, PartialEq)]
pub enum RefetchTrigger {
    /// Requested by the owner. A later request replaces an earlier one that has not
    /// launched yet.
    User(QueryMutation),
    /// The set of stores the query reads from changed. Reruns the current query and
    /// never replaces a queued user mutation.
    Topology,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefetchState {
    Idle,
    Pending {
        /// Mutation for the next launch, if one is queued.
        next: Option<QueryMutation>,
        /// Ticket of the fetch in flight.
        running: Option<u64>,
    },
}

/// A fetch the monitor must start now.
#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    pub ticket: u64,
    pub mutation: QueryMutation,
}

/// What a fetch completion means for the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The ticket is not the fetch in flight; discard the result.
    Stale,
    /// Install the result; another launch is queued.
    Continue,
    /// Install the result; the chain ends once the change scope drains.
    Settled,
}

#[derive(Debug)]
pub struct RefetchCoordinator {
    state: RefetchState,
    next_ticket: u64,
}

impl Default for RefetchCoordinator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RefetchCoordinator {
    /// Creates an idle coordinator whose first launch gets `first_ticket`.
    pub fn new(first_ticket: u64) -> Self {
        Self {
            state: RefetchState::Idle,
            next_ticket: first_ticket,
        }
    }

    pub fn state(&self) -> &RefetchState {
        &self.state
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        !matches!(self.state, RefetchState::Idle)
    }

    /// Ticket of the fetch in flight.
    pub fn running(&self) -> Option<u64> {
        match self.state {
            RefetchState::Pending { running, .. } => running,
            RefetchState::Idle => None,
        }
    }

    /// Records a request. Returns true when this request starts a new chain, in which
    /// case will-refetch must be emitted.
    pub fn request(&mut self, trigger: RefetchTrigger) -> bool {
        match &mut self.state {
            RefetchState::Idle => {
                let next = match trigger {
                    RefetchTrigger::User(mutation) => mutation,
                    RefetchTrigger::Topology => QueryMutation::default(),
                };
                self.state = RefetchState::Pending {
                    next: Some(next),
                    running: None,
                };
                true
            }
            RefetchState::Pending { next, .. } => {
                match trigger {
                    RefetchTrigger::User(mutation) => *next = Some(mutation),
                    RefetchTrigger::Topology => {
                        next.get_or_insert_with(QueryMutation::default);
                    }
                }
                false
            }
        }
    }

    /// Starts the queued fetch if nothing is in flight and `ready` holds.
    pub fn try_launch(&mut self, ready: bool) -> Option<Launch> {
        if !ready {
            return None;
        }
        let RefetchState::Pending { next, running } = &mut self.state else {
            return None;
        };
        if running.is_some() {
            return None;
        }
        let mutation = next.take()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        *running = Some(ticket);
        Some(Launch { ticket, mutation })
    }

    /// Records that fetch `ticket` finished successfully.
    pub fn complete(&mut self, ticket: u64) -> Completion {
        match &mut self.state {
            RefetchState::Pending { next, running } if *running == Some(ticket) => {
                *running = None;
                if next.is_some() {
                    Completion::Continue
                } else {
                    Completion::Settled
                }
            }
            _ => Completion::Stale,
        }
    }

    /// Ends a settled chain once `drained` holds. Returns true when did-refetch must
    /// be emitted.
    pub fn try_finish(&mut self, drained: bool) -> bool {
        match self.state {
            RefetchState::Pending {
                next: None,
                running: None,
            } if drained => {
                self.state = RefetchState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Abandons the chain. Returns true if `ticket` was the fetch in flight.
    pub fn abort(&mut self, ticket: u64) -> bool {
        let was_running = self.running() == Some(ticket);
        if was_running {
            self.state = RefetchState::Idle;
        }
        was_running
    }
}
