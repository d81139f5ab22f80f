//! Vigil Query - Query definitions, snapshots and engine interfaces.
//!
//! This crate describes *what* a monitor observes and *what* it gets back:
//!
//! - `definition`: `QueryDefinition`, `SectionBy`, and `QueryMutation` for refetches
//! - `predicate` / `ordering`: filter and sort expressions evaluated by engines
//! - `snapshot`: the materialized, sectioned result (`Snapshot`, `Section`)
//! - `change`: structural deltas (`ChangeEvent`) and the live-update signal stream
//! - `engine` / `topology`: the narrow interfaces a backing engine implements
//!
//! Nothing here executes a query; engines (see `vigil-storage`) do.

#![no_std]

extern crate alloc;

pub mod change;
pub mod definition;
pub mod engine;
pub mod ordering;
pub mod predicate;
pub mod snapshot;
pub mod topology;

pub use change::{ChangeEvent, LiveSignal};
pub use definition::{IndexTitle, QueryDefinition, QueryMutation, SectionBy};
pub use engine::{LiveSink, QueryEngine, TrackedQuery};
pub use ordering::SortDescriptor;
pub use predicate::{CompareOp, Predicate};
pub use snapshot::{Section, Snapshot};
pub use topology::{StoreTopology, TopologyEvent, TopologySink};
