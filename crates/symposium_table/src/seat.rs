//! A philosopher's place at the table.
//!
//! The seat is the only way a philosopher touches its forks. It tracks which
//! forks the philosopher holds and refuses any acquisition that would reach
//! for a lower-ranked fork while a higher-ranked one is held. That check is
//! what keeps customized philosophers from building a circular wait.

use crate::fork::Fork;
use crate::signal::StopSignal;
use crate::timing::Pacer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use symposium_core::{ForkId, Phase, PhilosopherId, ProtocolViolation, Wiring};
use tracing::{trace, warn};

/// One of the two forks next to a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Fork at the seat's own position
    Left,
    /// Fork at the next position
    Right,
}

impl Side {
    /// The other side
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Counters shared between a seat and the table
#[derive(Debug, Default)]
pub(crate) struct SeatStats {
    meals: AtomicU64,
    phase: AtomicU8,
}

impl SeatStats {
    pub(crate) fn meals(&self) -> u64 {
        self.meals.load(Ordering::Acquire)
    }

    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    fn record_meal(&self) {
        // Single writer: only the seat's own worker increments.
        self.meals.fetch_add(1, Ordering::Release);
    }
}

/// Handle a philosopher uses to acquire, eat and release
pub struct Seat {
    wiring: Wiring,
    left: Arc<dyn Fork>,
    right: Arc<dyn Fork>,
    holding_left: bool,
    holding_right: bool,
    stats: Arc<SeatStats>,
    pacer: Pacer,
    signal: StopSignal,
}

impl Seat {
    pub(crate) fn new(
        wiring: Wiring,
        left: Arc<dyn Fork>,
        right: Arc<dyn Fork>,
        stats: Arc<SeatStats>,
        pacer: Pacer,
        signal: StopSignal,
    ) -> Self {
        Self {
            wiring,
            left,
            right,
            holding_left: false,
            holding_right: false,
            stats,
            pacer,
            signal,
        }
    }

    /// Who sits here
    #[must_use]
    pub fn philosopher(&self) -> PhilosopherId {
        self.wiring.philosopher
    }

    /// Which forks this seat uses
    #[must_use]
    pub fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    /// Fork on one side
    #[must_use]
    pub fn fork_id(&self, side: Side) -> ForkId {
        match side {
            Side::Left => self.wiring.left,
            Side::Right => self.wiring.right,
        }
    }

    /// Side holding the lower-ranked fork
    #[must_use]
    pub fn first_side(&self) -> Side {
        if self.wiring.is_reversed() {
            Side::Right
        } else {
            Side::Left
        }
    }

    /// Whether the philosopher holds the fork on `side`
    #[must_use]
    pub fn holds(&self, side: Side) -> bool {
        match side {
            Side::Left => self.holding_left,
            Side::Right => self.holding_right,
        }
    }

    /// Whether the philosopher holds any fork
    #[must_use]
    pub fn holds_any(&self) -> bool {
        self.holding_left || self.holding_right
    }

    /// Meals eaten so far
    #[must_use]
    pub fn meals(&self) -> u64 {
        self.stats.meals()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.stats.phase()
    }

    /// Whether the table is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.signal.is_running()
    }

    fn fork(&self, side: Side) -> &dyn Fork {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    fn set_holding(&mut self, side: Side, holding: bool) {
        match side {
            Side::Left => self.holding_left = holding,
            Side::Right => self.holding_right = holding,
        }
    }

    /// Block until the fork on `side` is ours
    ///
    /// # Errors
    ///
    /// Returns `AlreadyHeld` if the fork is already held by this seat, and
    /// `OutOfOrder` if a higher-ranked fork is held
    pub fn acquire(&mut self, side: Side) -> Result<(), ProtocolViolation> {
        let caller = self.philosopher();
        let requested = self.fork_id(side);

        if self.holds(side) {
            return Err(ProtocolViolation::AlreadyHeld {
                fork: requested,
                caller,
            });
        }
        if self.holds(side.other()) {
            let held = self.fork_id(side.other());
            if held.rank() > requested.rank() {
                return Err(ProtocolViolation::OutOfOrder {
                    caller,
                    requested,
                    held,
                });
            }
        }

        trace!(philosopher = %caller, fork = %requested, "acquiring");
        self.fork(side).acquire(caller)?;
        self.set_holding(side, true);
        trace!(philosopher = %caller, fork = %requested, "acquired");
        Ok(())
    }

    /// Give back the fork on `side`
    ///
    /// # Errors
    ///
    /// Returns `NotHolder` if this seat does not hold that fork
    pub fn release(&mut self, side: Side) -> Result<(), ProtocolViolation> {
        let caller = self.philosopher();
        self.fork(side).release(caller)?;
        self.set_holding(side, false);
        trace!(philosopher = %caller, fork = %self.fork_id(side), "released");
        Ok(())
    }

    /// Acquire both forks, lower rank first
    ///
    /// # Errors
    ///
    /// Returns a violation if either fork is already held
    pub fn acquire_both(&mut self) -> Result<(), ProtocolViolation> {
        let first = self.first_side();
        self.acquire(first)?;
        self.acquire(first.other())
    }

    /// Release both forks, higher rank first
    ///
    /// # Errors
    ///
    /// Returns `NotHolder` if either fork is not held
    pub fn release_both(&mut self) -> Result<(), ProtocolViolation> {
        let first = self.first_side();
        self.release(first.other())?;
        self.release(first)
    }

    /// The standard meal: acquire both, eat, release both
    ///
    /// # Errors
    ///
    /// Returns a violation if the philosopher already holds a fork
    pub fn dine(&mut self) -> Result<(), ProtocolViolation> {
        self.acquire_both()?;
        self.stats.set_phase(Phase::Eating);
        self.stats.record_meal();
        self.pacer.eat();
        self.release_both()?;
        self.stats.set_phase(Phase::Thinking);
        Ok(())
    }

    /// Release whatever is still held, higher rank first
    ///
    /// Used when a worker leaves its cycle early so neighbours are never
    /// blocked on a fork nobody will return.
    pub fn release_all(&mut self) {
        let first = self.first_side();
        for side in [first.other(), first] {
            if self.holds(side) {
                if let Err(violation) = self.release(side) {
                    warn!(%violation, "fork lost during cleanup");
                    self.set_holding(side, false);
                }
            }
        }
    }

    pub(crate) fn think(&mut self) {
        self.pacer.think();
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.stats.set_phase(phase);
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        self.release_all();
    }
}
