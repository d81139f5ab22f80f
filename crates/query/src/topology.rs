//! Store attach/detach notifications.

use alloc::sync::Arc;
use alloc::vec::Vec;
use vigil_core::StoreId;

/// A change to the set of attached stores.
///
/// Every `StoresWillChange` is followed by exactly one `StoresDidChange`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyEvent {
    StoresWillChange { removed: Vec<StoreId> },
    StoresDidChange { added: Vec<StoreId>, removed: Vec<StoreId> },
}

/// Receiver of topology events.
pub trait TopologySink: Send + Sync {
    /// Returns `false` once the receiver has been dropped.
    fn send_topology(&self, event: TopologyEvent) -> bool;
}

/// Source of topology events.
pub trait StoreTopology: Send + Sync {
    fn subscribe_topology(&self, sink: Arc<dyn TopologySink>);
}
