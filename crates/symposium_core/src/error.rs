//! Core error types for SYMPOSIUM.

use crate::id::{ForkId, PhilosopherId};
use serde::{Deserialize, Serialize};

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// A philosopher broke the fork protocol
///
/// Violations are fatal to the offending worker only. The seat releases
/// whatever the worker still holds before it exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ProtocolViolation {
    /// Released a fork it does not hold
    #[error("{caller} released {fork} without holding it")]
    NotHolder {
        /// Fork being released
        fork: ForkId,
        /// Philosopher that called release
        caller: PhilosopherId,
        /// Actual holder at the time of the call
        holder: Option<PhilosopherId>,
    },

    /// Acquired a fork it already holds
    #[error("{caller} acquired {fork} twice")]
    AlreadyHeld {
        /// Fork being acquired
        fork: ForkId,
        /// Philosopher that called acquire
        caller: PhilosopherId,
    },

    /// Reached for a fork ranked below one it already holds
    #[error("{caller} requested {requested} while holding higher-ranked {held}")]
    OutOfOrder {
        /// Philosopher that called acquire
        caller: PhilosopherId,
        /// Fork being acquired
        requested: ForkId,
        /// Higher-ranked fork already held
        held: ForkId,
    },
}

impl ProtocolViolation {
    /// Philosopher responsible for the violation
    #[must_use]
    pub const fn caller(&self) -> PhilosopherId {
        match self {
            Self::NotHolder { caller, .. }
            | Self::AlreadyHeld { caller, .. }
            | Self::OutOfOrder { caller, .. } => *caller,
        }
    }
}

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Ring too small to have contention
    #[error("Invalid table: {seats} seats, need at least {min}")]
    TooFewSeats {
        /// Requested seat count
        seats: usize,
        /// Minimum accepted seat count
        min: usize,
    },

    /// Delay range with min above max
    #[error("Invalid delay range: {reason}")]
    InvalidDelay {
        /// What was wrong
        reason: String,
    },

    /// Validation error
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}
