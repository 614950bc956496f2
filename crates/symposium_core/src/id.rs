//! Identifiers for SYMPOSIUM entities.
//!
//! Seats and forks are identified by their ring position. Runs get a UUID so
//! reports from different runs can be told apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Philosopher identifier - the seat index at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhilosopherId(usize);

impl PhilosopherId {
    /// Create from a seat index
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the seat index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Whether the seat index is even
    #[must_use]
    pub const fn is_even(&self) -> bool {
        self.0 % 2 == 0
    }
}

impl std::fmt::Display for PhilosopherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl From<usize> for PhilosopherId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Fork identifier - the fork's ring position
///
/// The position doubles as the fork's rank in the global acquisition order:
/// a lower index is always acquired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForkId(usize);

impl ForkId {
    /// Create from a ring position
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the ring position
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Get the rank in the global acquisition order
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ForkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F{}", self.0)
    }
}

impl From<usize> for ForkId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Run identifier - identifies a single harness run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_{}", self.0)
    }
}
