//! Table configuration.

use crate::timing::Timing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use symposium_core::{CoreError, CoreResult, MIN_SEATS};

/// How a fork picks the next holder among its waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FairnessMode {
    /// One arbitrary waiter is woken
    #[default]
    Unordered,
    /// Waiters are served in arrival order
    Fifo,
}

impl fmt::Display for FairnessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unordered => write!(f, "unordered"),
            Self::Fifo => write!(f, "fifo"),
        }
    }
}

impl FromStr for FairnessMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unordered" | "default" => Ok(Self::Unordered),
            "fifo" | "fair" => Ok(Self::Fifo),
            other => Err(CoreError::Validation {
                field: "fairness".to_string(),
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of philosophers (and forks)
    pub seats: usize,
    /// Fork arbitration
    pub fairness: FairnessMode,
    /// Think and eat durations
    pub timing: Timing,
    /// Base seed for per-seat delay streams
    pub seed: u64,
}

impl TableConfig {
    /// Create a config for `seats` philosophers
    #[must_use]
    pub fn new(seats: usize) -> Self {
        Self {
            seats,
            fairness: FairnessMode::Unordered,
            timing: Timing::immediate(),
            seed: 42,
        }
    }

    /// Set fairness mode
    #[must_use]
    pub fn with_fairness(mut self, fairness: FairnessMode) -> Self {
        self.fairness = fairness;
        self
    }

    /// Set think and eat timing
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Set base seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check seat count and delay ranges
    ///
    /// # Errors
    ///
    /// Returns `TooFewSeats` below two seats, or `InvalidDelay` for an empty range
    pub fn validate(&self) -> CoreResult<()> {
        if self.seats < MIN_SEATS {
            return Err(CoreError::TooFewSeats {
                seats: self.seats,
                min: MIN_SEATS,
            });
        }
        self.timing.validate()
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::DelayRange;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.seats, 5);
        assert_eq!(config.fairness, FairnessMode::Unordered);
        assert_eq!(config.timing, Timing::immediate());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builders() {
        let config = TableConfig::new(3)
            .with_fairness(FairnessMode::Fifo)
            .with_seed(7)
            .with_timing(Timing::immediate().with_eat(DelayRange::up_to_millis(2)));
        assert_eq!(config.seats, 3);
        assert_eq!(config.fairness, FairnessMode::Fifo);
        assert_eq!(config.seed, 7);
        assert_eq!(config.timing.eat.max, Duration::from_millis(2));
    }

    #[test]
    fn test_config_rejects_small_tables() {
        for seats in [0, 1] {
            assert_eq!(
                TableConfig::new(seats).validate(),
                Err(CoreError::TooFewSeats { seats, min: 2 })
            );
        }
        assert!(TableConfig::new(2).validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_timing() {
        let bad = DelayRange {
            min: Duration::from_millis(5),
            max: Duration::ZERO,
        };
        let config = TableConfig::new(4).with_timing(Timing::immediate().with_think(bad));
        assert!(matches!(config.validate(), Err(CoreError::InvalidDelay { .. })));
    }

    #[test]
    fn test_fairness_parse() {
        assert_eq!("fifo".parse::<FairnessMode>().unwrap(), FairnessMode::Fifo);
        assert_eq!("FAIR".parse::<FairnessMode>().unwrap(), FairnessMode::Fifo);
        assert_eq!(
            "unordered".parse::<FairnessMode>().unwrap(),
            FairnessMode::Unordered
        );
        assert!("round-robin".parse::<FairnessMode>().is_err());
        assert_eq!(FairnessMode::Fifo.to_string(), "fifo");
    }

    #[test]
    fn test_config_json_partial() {
        let config: TableConfig = serde_json::from_str(r#"{"seats": 3, "fairness": "fifo"}"#).unwrap();
        assert_eq!(config.seats, 3);
        assert_eq!(config.fairness, FairnessMode::Fifo);
        assert_eq!(config.seed, 42);
    }
}
