//! Philosopher phase machine.

use serde::{Deserialize, Serialize};

/// What a philosopher is doing right now
///
/// The cycle is always `Thinking -> Hungry -> Eating -> Thinking`. A
/// philosopher that fails to acquire its forks goes back to `Thinking`
/// from `Hungry` without eating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Not holding and not waiting for any fork
    Thinking,
    /// Waiting to acquire both forks
    Hungry,
    /// Holding both forks
    Eating,
}

impl Phase {
    /// Encode for atomic storage
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Thinking => 0,
            Self::Hungry => 1,
            Self::Eating => 2,
        }
    }

    /// Decode from atomic storage
    ///
    /// Unknown values decode as `Thinking`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Hungry,
            2 => Self::Eating,
            _ => Self::Thinking,
        }
    }

    /// The phase that follows this one in a successful cycle
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Thinking => Self::Hungry,
            Self::Hungry => Self::Eating,
            Self::Eating => Self::Thinking,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        self.next() == to || (self == Self::Hungry && to == Self::Thinking)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Thinking
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thinking => write!(f, "thinking"),
            Self::Hungry => write!(f, "hungry"),
            Self::Eating => write!(f, "eating"),
        }
    }
}
