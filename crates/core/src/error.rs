//! Error types for Vigil.

use crate::record::{RecordId, StoreId};
use alloc::string::String;
use thiserror::Error;

/// Result type alias for Vigil operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types shared by engines and monitors.
///
/// Index contract violations are not represented here: out-of-range "unsafe" accessors
/// panic, and their `safe_*` counterparts return `None`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Executing a query failed inside the engine.
    #[error("fetch of `{entity}` failed: {message}")]
    FetchFailed { entity: String, message: String },
    /// The monitor session was terminated by an earlier fatal error.
    #[error("monitor session terminated: {reason}")]
    SessionTerminated { reason: String },
    /// A snapshot was built with the same record twice.
    #[error("record {0} appears more than once in a snapshot")]
    DuplicateRecord(RecordId),
    /// Record not found in its store.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),
    /// Store is not attached.
    #[error("store not attached: {0}")]
    StoreNotFound(StoreId),
    /// The query cannot be executed as written.
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },
    /// The control mailbox has no receiver any more.
    #[error("control mailbox closed")]
    MailboxClosed,
}

impl Error {
    /// Creates a fetch failure error.
    pub fn fetch_failed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::FetchFailed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates a session terminated error.
    pub fn session_terminated(reason: impl Into<String>) -> Self {
        Error::SessionTerminated {
            reason: reason.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns true for errors that end a monitor session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FetchFailed { .. } | Error::SessionTerminated { .. })
    }
}
