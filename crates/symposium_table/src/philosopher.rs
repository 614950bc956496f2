//! Philosopher behaviour.
//!
//! A philosopher only decides what happens when it gets hungry. The worker
//! loop around it (thinking, phase changes, the stop signal) belongs to the
//! table, and fork access goes through the [`Seat`], which enforces the
//! acquisition order.

use crate::seat::Seat;
use symposium_core::{PhilosopherId, ProtocolViolation};

/// Hook run once per hunger cycle
pub trait Philosopher: Send {
    /// Called with the phase set to `Hungry`
    ///
    /// The default eats one meal. Implementations may delay, log, or take
    /// forks themselves before delegating to [`Seat::dine`]. Forks left held
    /// when this returns are released by the table.
    ///
    /// # Errors
    ///
    /// A returned violation ends this philosopher's worker
    fn on_hungry(&mut self, seat: &mut Seat) -> Result<(), ProtocolViolation> {
        seat.dine()
    }
}

/// Builds the philosopher for each seat
pub type PhilosopherFactory = Box<dyn Fn(PhilosopherId) -> Box<dyn Philosopher> + Send + Sync>;

/// Philosopher that just eats
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPhilosopher;

impl DefaultPhilosopher {
    /// Factory producing default philosophers
    #[must_use]
    pub fn factory() -> PhilosopherFactory {
        Box::new(|_| Box::new(Self) as Box<dyn Philosopher>)
    }
}

impl Philosopher for DefaultPhilosopher {}

/// Philosopher whose hunger hook is a closure
pub struct FnPhilosopher<F> {
    hook: F,
}

impl<F> FnPhilosopher<F>
where
    F: FnMut(&mut Seat) -> Result<(), ProtocolViolation> + Send,
{
    /// Wrap a closure
    #[must_use]
    pub fn new(hook: F) -> Self {
        Self { hook }
    }
}

impl<F> Philosopher for FnPhilosopher<F>
where
    F: FnMut(&mut Seat) -> Result<(), ProtocolViolation> + Send,
{
    fn on_hungry(&mut self, seat: &mut Seat) -> Result<(), ProtocolViolation> {
        (self.hook)(seat)
    }
}
