//! Vigil Core - Core types shared by every Vigil crate.
//!
//! This crate provides the foundational types for live, sectioned query monitors:
//!
//! - `Value`: Runtime field values with a total ordering (used for sorting and sectioning)
//! - `Record`: A stored record of some entity kind, addressed by a `RecordId`
//! - `RecordId` / `StoreId`: Opaque identities owned by the backing store
//! - `IndexPath`: A `(section, item)` position inside a sectioned result
//! - `Error`: Error types shared across the workspace
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{Record, RecordId, StoreId, Value};
//!
//! let id = RecordId::new(StoreId::new(1), 7);
//! let task = Record::new(id, "Task")
//!     .with_field("title", "write docs")
//!     .with_field("priority", "high");
//!
//! assert_eq!(task.id(), id);
//! assert_eq!(task.get("priority"), Some(&Value::from("high")));
//! assert_eq!(task.get("missing"), None);
//! ```

#![no_std]

extern crate alloc;

mod error;
mod path;
mod record;
mod value;

pub use error::{Error, Result};
pub use path::IndexPath;
pub use record::{Record, RecordId, StoreId};
pub use value::Value;
