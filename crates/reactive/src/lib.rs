//! Vigil Reactive - Observer registry and change dispatch.
//!
//! This crate turns the live-update signal stream of a tracked query into
//! notifications for registered observers.
//!
//! # Core Concepts
//!
//! - `ListObserver` / `ListObjectObserver` / `ListSectionObserver`: the three
//!   observer tiers, each extending the previous one
//! - `ObserverRegistry`: weakly held observers keyed by allocation identity
//! - `ChangeScope`: open content scopes and topology holds
//! - `ChangeCollector`: brackets signals into will-change / deltas / did-change
//! - `ChangeSet` / `SubscriptionManager`: whole-batch closure subscriptions
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use vigil_reactive::{ListObserver, ObserverRegistry};
//!
//! struct Monitor;
//!
//! #[derive(Default)]
//! struct Badge {
//!     refreshes: Cell<usize>,
//! }
//!
//! impl ListObserver<Monitor> for Badge {
//!     fn list_did_change(&self, _: &Monitor) {
//!         self.refreshes.set(self.refreshes.get() + 1);
//!     }
//! }
//!
//! let registry = ObserverRegistry::new();
//! let badge = Rc::new(Badge::default());
//! registry.add_list(&badge);
//! registry.dispatch_list(|o| o.list_did_change(&Monitor));
//! assert_eq!(badge.refreshes.get(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod change_set;
pub mod collector;
pub mod observer;
pub mod registry;
pub mod scope;
pub mod subscription;

pub use change_set::ChangeSet;
pub use collector::{ChangeCollector, CollectorStep};
pub use observer::{Capabilities, ListObjectObserver, ListObserver, ListSectionObserver};
pub use registry::ObserverRegistry;
pub use scope::ChangeScope;
pub use subscription::{ChangeCallback, SubscriptionId, SubscriptionManager};
