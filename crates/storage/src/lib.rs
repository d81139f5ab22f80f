//! Vigil Storage - In-memory reference engine.
//!
//! This crate implements the engine interfaces of `vigil-query` on top of plain
//! in-memory maps so that monitors can be driven end to end:
//!
//! - `RecordStore`: the records of one attached store
//! - `StoreCache`: the set of attached stores
//! - `Journal` / `Transaction`: journaled writes with rollback
//! - `executor`: filter, sort, window and section a query
//! - `diff`: structural diff between two snapshots
//! - `MemoryEngine`: ties it together, with live tracking and topology broadcasts
//!
//! There is no durability, indexing or schema.

pub mod cache;
pub mod diff;
pub mod engine;
pub mod executor;
pub mod journal;
pub mod record_store;
pub mod transaction;

pub use cache::StoreCache;
pub use engine::{MemoryEngine, Tracker};
pub use journal::{Journal, JournalEntry};
pub use record_store::RecordStore;
pub use transaction::{Transaction, TransactionId, TransactionState};
