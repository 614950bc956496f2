//! Table-wide running flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop signal checked by every worker at the top of its cycle
///
/// Cloning shares the flag. A stop is visible to each worker no later than
/// its next cycle boundary.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    running: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal in the stopped state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the running flag
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Lower the running flag; returns whether it was raised
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Whether workers should keep cycling
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
