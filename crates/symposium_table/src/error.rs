//! Table errors.

use symposium_core::{CoreError, PhilosopherId};
use thiserror::Error;

/// Errors raised by the table lifecycle
#[derive(Debug, Error)]
pub enum TableError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] CoreError),

    /// `start` called on a running table
    #[error("Table already started")]
    AlreadyStarted,

    /// `start` called after `stop`
    #[error("Table has stopped and cannot be restarted")]
    Finished,

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker for {philosopher}: {reason}")]
    Spawn {
        /// Philosopher whose worker failed
        philosopher: PhilosopherId,
        /// OS error
        reason: String,
    },
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;
