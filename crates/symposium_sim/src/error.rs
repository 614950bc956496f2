//! Harness errors.

use std::time::Duration;
use symposium_table::TableError;
use thiserror::Error;

/// Errors raised while driving a run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The run did not end before the timeout
    #[error("Liveness failure: run still going after {timeout:?} ({meals} meals eaten)")]
    Liveness {
        /// Timeout that elapsed
        timeout: Duration,
        /// Total meals last observed
        meals: u64,
    },

    /// Table lifecycle error
    #[error(transparent)]
    Table(#[from] TableError),

    /// Invalid run configuration
    #[error("Invalid run config: {0}")]
    Config(String),

    /// The thread driving the table failed
    #[error("Run thread failed: {0}")]
    Driver(String),
}

impl HarnessError {
    /// Whether this is a liveness failure rather than a logic error
    #[must_use]
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::Liveness { .. })
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
