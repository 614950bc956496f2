//! Think and eat durations.
//!
//! Durations are drawn from a [`DelayRange`] with a per-seat `ChaCha8Rng`.
//! Each seat's seed is derived from the table seed and the seat index, so a
//! given seed always yields the same sequence of delays for a seat.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::time::Duration;
use symposium_core::{CoreError, CoreResult, PhilosopherId};

/// Inclusive range a delay is sampled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    /// Shortest delay
    pub min: Duration,
    /// Longest delay
    pub max: Duration,
}

impl DelayRange {
    /// No delay at all
    pub const ZERO: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Always the same delay
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Uniform delay in `[min, max]`
    ///
    /// # Errors
    ///
    /// Returns error if `min > max`
    pub fn between(min: Duration, max: Duration) -> CoreResult<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Uniform delay in `[0, max_ms]` milliseconds
    #[must_use]
    pub const fn up_to_millis(max_ms: u64) -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::from_millis(max_ms),
        }
    }

    /// Check that `min <= max`
    ///
    /// # Errors
    ///
    /// Returns error if the range is empty
    pub fn validate(&self) -> CoreResult<()> {
        if self.min > self.max {
            return Err(CoreError::InvalidDelay {
                reason: format!("min {:?} exceeds max {:?}", self.min, self.max),
            });
        }
        Ok(())
    }

    /// Whether every sample is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Draw a delay
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let lo = nanos(self.min);
        let hi = nanos(self.max);
        Duration::from_nanos(rng.gen_range(lo..=hi))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::ZERO
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// How long philosophers think and eat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    /// Delay between finishing a meal and getting hungry again
    pub think: DelayRange,
    /// Delay spent holding both forks
    pub eat: DelayRange,
}

impl Timing {
    /// Think and eat take no time
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            think: DelayRange::ZERO,
            eat: DelayRange::ZERO,
        }
    }

    /// Set think range
    #[must_use]
    pub fn with_think(mut self, think: DelayRange) -> Self {
        self.think = think;
        self
    }

    /// Set eat range
    #[must_use]
    pub fn with_eat(mut self, eat: DelayRange) -> Self {
        self.eat = eat;
        self
    }

    /// Check both ranges
    ///
    /// # Errors
    ///
    /// Returns error if either range is empty
    pub fn validate(&self) -> CoreResult<()> {
        self.think.validate()?;
        self.eat.validate()
    }
}

/// Derive the seed for one seat from the table seed
#[must_use]
pub fn seat_seed(base: u64, philosopher: PhilosopherId) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write_u64(base);
    hasher.write(b"seat");
    hasher.write_u64(philosopher.index() as u64);
    hasher.finish()
}

/// Per-seat source of think and eat delays
#[derive(Debug, Clone)]
pub struct Pacer {
    timing: Timing,
    rng: ChaCha8Rng,
}

impl Pacer {
    /// Create a pacer with its own RNG stream
    #[must_use]
    pub fn new(timing: Timing, seed: u64) -> Self {
        Self {
            timing,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create the pacer for one seat of a table
    #[must_use]
    pub fn for_seat(timing: Timing, base_seed: u64, philosopher: PhilosopherId) -> Self {
        Self::new(timing, seat_seed(base_seed, philosopher))
    }

    /// Next think duration
    pub fn next_think(&mut self) -> Duration {
        self.timing.think.sample(&mut self.rng)
    }

    /// Next eat duration
    pub fn next_eat(&mut self) -> Duration {
        self.timing.eat.sample(&mut self.rng)
    }

    /// Sleep for the next think duration
    pub fn think(&mut self) {
        pause(self.next_think());
    }

    /// Sleep for the next eat duration
    pub fn eat(&mut self) {
        pause(self.next_eat());
    }

    /// Timing this pacer draws from
    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
