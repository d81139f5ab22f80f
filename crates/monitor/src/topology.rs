//! Store topology bookkeeping for one monitor.

use hashbrown::HashSet;
use vigil_core::StoreId;
use vigil_reactive::ChangeScope;

/// Tracks which attached stores the monitored query reads from, and decides when a
/// topology change makes the current result stale.
///
/// Every will-change opens a topology hold on the monitor's change scope and the
/// matching did-change closes it, so no refetch launches between the two.
#[derive(Debug, Default)]
pub struct TopologyListener {
    effective: HashSet<StoreId>,
}

impl TopologyListener {
    pub fn new(effective: HashSet<StoreId>) -> Self {
        Self { effective }
    }

    /// Stores the current result was read from.
    pub fn effective(&self) -> &HashSet<StoreId> {
        &self.effective
    }

    /// Replaces the cached set after a fetch.
    pub fn reset(&mut self, effective: HashSet<StoreId>) {
        self.effective = effective;
    }

    /// Handles stores about to be removed. Returns true if a refetch is needed.
    pub fn will_change(&mut self, removed: &[StoreId], scope: &mut ChangeScope) -> bool {
        scope.hold_topology();
        let affected = removed.iter().any(|id| self.effective.contains(id));
        tracing::debug!(removed = removed.len(), affected, "stores will change");
        affected
    }

    /// Handles a completed topology change. Returns true if a refetch is needed.
    ///
    /// The effective set becomes `(previous ∪ admitted(added)) − removed`. A refetch
    /// is only requested when the set differs and none is pending already.
    pub fn did_change(
        &mut self,
        added: &[StoreId],
        removed: &[StoreId],
        admits: impl Fn(StoreId) -> bool,
        refetch_pending: bool,
        scope: &mut ChangeScope,
    ) -> bool {
        let mut next = self.effective.clone();
        next.extend(added.iter().copied().filter(|&id| admits(id)));
        for id in removed {
            next.remove(id);
        }

        let changed = next != self.effective;
        self.effective = next;
        if !scope.release_topology() {
            tracing::warn!("stores did change without a matching will-change");
        }
        tracing::debug!(changed, refetch_pending, "stores did change");
        changed && !refetch_pending
    }
}
