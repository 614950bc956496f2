//! Adversarial scenarios.
//!
//! Each scenario customizes forks or philosophers in a way that would break
//! a naive table: long holds, staggered hunger, a neighbour that hoards both
//! forks. A correct table finishes every one of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use symposium_core::{ForkId, PhilosopherId, ProtocolViolation};
use symposium_table::{
    DefaultPhilosopher, FairnessMode, Fork, ForkFactory, Philosopher, PhilosopherFactory, Seat,
    Table, TableBuilder, TableConfig, TableResult,
};
use tracing::{debug, info};

/// Extra hunger delay per seat index in [`Scenario::Staggered`]
pub const STAGGER_STEP: Duration = Duration::from_millis(20);
/// How long a [`NoisyFork`] is held before `acquire` returns
pub const NOISY_HOLD: Duration = Duration::from_millis(100);
/// How long the greedy philosopher hoards both forks
pub const GREEDY_HOLD: Duration = Duration::from_secs(1);
/// Hunger delay for even seats in [`Scenario::Alternating`]
pub const EVEN_DELAY: Duration = Duration::from_millis(1);
/// Hunger delay for odd seats in [`Scenario::Alternating`]
pub const ODD_DELAY: Duration = Duration::from_millis(10);

/// Philosopher that waits a fixed delay before each meal
#[derive(Debug, Clone, Copy)]
pub struct DelayedPhilosopher {
    delay: Duration,
}

impl DelayedPhilosopher {
    /// Wait `delay` before each meal
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Philosopher for DelayedPhilosopher {
    fn on_hungry(&mut self, seat: &mut Seat) -> Result<(), ProtocolViolation> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        debug!(philosopher = %seat.philosopher(), meals = seat.meals(), "hungry");
        seat.dine()
    }
}

/// Philosopher that hoards both forks once before eating normally
#[derive(Debug, Clone, Copy)]
pub struct GreedyPhilosopher {
    hold: Duration,
    hoarded: bool,
}

impl GreedyPhilosopher {
    /// Hoard both forks for `hold` on the first hunger
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            hoarded: false,
        }
    }
}

impl Philosopher for GreedyPhilosopher {
    fn on_hungry(&mut self, seat: &mut Seat) -> Result<(), ProtocolViolation> {
        if !self.hoarded {
            self.hoarded = true;
            seat.acquire_both()?;
            info!(philosopher = %seat.philosopher(), hold = ?self.hold, "hoarding both forks");
            std::thread::sleep(self.hold);
            seat.release_both()?;
        }
        seat.dine()
    }
}

/// Fork that logs every acquisition and holds on for a while after taking it
pub struct NoisyFork {
    inner: Arc<dyn Fork>,
    hold: Duration,
}

impl NoisyFork {
    /// Wrap a fork
    #[must_use]
    pub fn new(inner: Arc<dyn Fork>, hold: Duration) -> Self {
        Self { inner, hold }
    }

    /// Wrap every fork a factory builds
    #[must_use]
    pub fn wrap(factory: ForkFactory, hold: Duration) -> ForkFactory {
        Box::new(move |id| Arc::new(Self::new(factory(id), hold)) as Arc<dyn Fork>)
    }
}

impl Fork for NoisyFork {
    fn id(&self) -> ForkId {
        self.inner.id()
    }

    fn acquire(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        debug!(philosopher = %who, fork = %self.id(), "trying fork");
        self.inner.acquire(who)?;
        debug!(philosopher = %who, fork = %self.id(), "got fork");
        // Held already; neighbours block for the whole delay.
        std::thread::sleep(self.hold);
        Ok(())
    }

    fn release(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        self.inner.release(who)
    }

    fn holder(&self) -> Option<PhilosopherId> {
        self.inner.holder()
    }

    fn waiting(&self) -> usize {
        self.inner.waiting()
    }
}

/// Named table variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Default forks and philosophers
    #[default]
    Plain,
    /// Philosopher `i` waits `i x 20ms` before each meal
    Staggered,
    /// Every fork is held 100ms after being taken
    Noisy,
    /// Philosopher 0 hoards both forks for 1s once
    Greedy,
    /// Even seats wait 1ms and odd seats 10ms before each meal
    Alternating,
}

impl Scenario {
    /// Every scenario
    pub const ALL: [Self; 5] = [
        Self::Plain,
        Self::Staggered,
        Self::Noisy,
        Self::Greedy,
        Self::Alternating,
    ];

    /// One-line description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Plain => "default forks and philosophers",
            Self::Staggered => "seat i waits i x 20ms before each meal",
            Self::Noisy => "forks are held 100ms after each acquisition",
            Self::Greedy => "P0 hoards both forks for 1s once",
            Self::Alternating => "even seats wait 1ms, odd seats 10ms",
        }
    }

    /// Philosopher factory for this scenario
    #[must_use]
    pub fn philosophers(self) -> PhilosopherFactory {
        match self {
            Self::Plain | Self::Noisy => DefaultPhilosopher::factory(),
            Self::Staggered => Box::new(|id: PhilosopherId| {
                let steps = u32::try_from(id.index()).unwrap_or(u32::MAX);
                Box::new(DelayedPhilosopher::new(STAGGER_STEP.saturating_mul(steps)))
                    as Box<dyn Philosopher>
            }),
            Self::Greedy => Box::new(|id: PhilosopherId| {
                if id.index() == 0 {
                    Box::new(GreedyPhilosopher::new(GREEDY_HOLD)) as Box<dyn Philosopher>
                } else {
                    Box::new(DefaultPhilosopher)
                }
            }),
            Self::Alternating => Box::new(|id: PhilosopherId| {
                let delay = if id.is_even() { EVEN_DELAY } else { ODD_DELAY };
                Box::new(DelayedPhilosopher::new(delay)) as Box<dyn Philosopher>
            }),
        }
    }

    /// Table builder with this scenario's forks and philosophers
    #[must_use]
    pub fn builder(self, config: TableConfig) -> TableBuilder {
        let builder = Table::builder(config.clone()).with_philosophers(self.philosophers());
        match self {
            Self::Noisy => builder.with_forks(NoisyFork::wrap(base_forks(config.fairness), NOISY_HOLD)),
            _ => builder,
        }
    }

    /// Build a table for this scenario
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid
    pub fn table(self, config: TableConfig) -> TableResult<Table> {
        self.builder(config).build()
    }
}

fn base_forks(fairness: FairnessMode) -> ForkFactory {
    match fairness {
        FairnessMode::Unordered => symposium_table::DefaultFork::factory(),
        FairnessMode::Fifo => symposium_table::FairFork::factory(),
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Staggered => "staggered",
            Self::Noisy => "noisy",
            Self::Greedy => "greedy",
            Self::Alternating => "alternating",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scenario '{s}'"))
    }
}
