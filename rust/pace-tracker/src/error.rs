//! Unified error handling for the pace-tracker library.
//!
//! Only lifecycle misuse and storage backends produce errors. Sensor problems
//! are reported through [`GpsStatus`](crate::session::GpsStatus) and history
//! failures are absorbed by [`RunHistory`](crate::history::RunHistory), so a
//! running session never sees an `Err` from either.

use crate::session::RunState;

/// Unified error type for pace-tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A lifecycle action was requested from a state that does not allow it
    #[error("cannot {action} while {from:?}")]
    InvalidTransition { from: RunState, action: &'static str },

    /// The key-value store rejected a read or write
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Stored JSON could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure in the file-backed store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The session driver task has exited
    #[cfg(feature = "runtime")]
    #[error("session driver stopped")]
    DriverStopped,

    /// SQLite failure in the database-backed store
    #[cfg(feature = "persistence")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl TrackerError {
    pub(crate) fn storage(message: impl Into<String>) -> Self {
        TrackerError::Storage {
            message: message.into(),
        }
    }
}

/// Result type alias for pace-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
