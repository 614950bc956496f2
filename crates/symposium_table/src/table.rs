//! The dining table engine.
//!
//! Owns the ring of forks and philosophers, spawns one OS thread per seat,
//! and collects results when stopped. Lifecycle is `Idle -> Running ->
//! Stopped`; a table never restarts.

use crate::config::{FairnessMode, TableConfig};
use crate::error::{TableError, TableResult};
use crate::fork::{DefaultFork, FairFork, Fork, ForkFactory};
use crate::monitor::{OccupancyMonitor, OccupancyReport};
use crate::philosopher::{DefaultPhilosopher, Philosopher, PhilosopherFactory};
use crate::seat::{Seat, SeatStats};
use crate::signal::StopSignal;
use crate::timing::Pacer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use symposium_core::{CoreError, ForkId, Phase, PhilosopherId, ProtocolViolation, Topology, Wiring};
use tracing::{debug, info, warn};

/// Table lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableState {
    /// Built, workers not spawned
    Idle,
    /// Workers cycling
    Running,
    /// Workers joined
    Stopped,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a worker ended before the stop signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerFailure {
    /// The hunger hook broke the fork protocol
    Violation(ProtocolViolation),
    /// The hunger hook panicked
    Panicked {
        /// Philosopher whose worker panicked
        philosopher: PhilosopherId,
    },
}

impl WorkerFailure {
    /// Philosopher whose worker failed
    #[must_use]
    pub fn philosopher(&self) -> PhilosopherId {
        match self {
            Self::Violation(violation) => violation.caller(),
            Self::Panicked { philosopher } => *philosopher,
        }
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Violation(violation) => write!(f, "{violation}"),
            Self::Panicked { philosopher } => write!(f, "{philosopher} panicked"),
        }
    }
}

/// Builder for a [`Table`] with custom forks, philosophers or monitoring
pub struct TableBuilder {
    config: TableConfig,
    forks: Option<ForkFactory>,
    philosophers: Option<PhilosopherFactory>,
    monitored: bool,
}

impl TableBuilder {
    /// Start from a config
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            forks: None,
            philosophers: None,
            monitored: false,
        }
    }

    /// Use a custom fork factory instead of the fairness mode's fork
    #[must_use]
    pub fn with_forks(mut self, factory: ForkFactory) -> Self {
        self.forks = Some(factory);
        self
    }

    /// Use a custom philosopher factory
    #[must_use]
    pub fn with_philosophers(mut self, factory: PhilosopherFactory) -> Self {
        self.philosophers = Some(factory);
        self
    }

    /// Wrap every fork in an occupancy monitor
    #[must_use]
    pub fn with_monitor(mut self) -> Self {
        self.monitored = true;
        self
    }

    /// Validate the config and build the ring
    ///
    /// # Errors
    ///
    /// Returns error for an invalid config, or if the fork factory builds a
    /// fork for the wrong position
    pub fn build(self) -> TableResult<Table> {
        self.config.validate()?;
        let topology = Topology::ring(self.config.seats)?;

        let mut fork_factory = self
            .forks
            .unwrap_or_else(|| default_forks(self.config.fairness));
        let monitor = self
            .monitored
            .then(|| Arc::new(OccupancyMonitor::new(topology.seats())));
        if let Some(monitor) = &monitor {
            fork_factory = monitor.wrap(fork_factory);
        }

        let mut forks = Vec::with_capacity(topology.seats());
        for id in topology.forks() {
            let fork = fork_factory(id);
            if fork.id() != id {
                return Err(CoreError::Validation {
                    field: "forks".to_string(),
                    reason: format!("factory built {} for position {id}", fork.id()),
                }
                .into());
            }
            forks.push(fork);
        }

        let philosopher_factory = self
            .philosophers
            .unwrap_or_else(DefaultPhilosopher::factory);
        let pending = topology.philosophers().map(|id| philosopher_factory(id)).collect();
        let stats = topology
            .philosophers()
            .map(|_| Arc::new(SeatStats::default()))
            .collect();

        debug!(seats = topology.seats(), fairness = %self.config.fairness, "table built");

        Ok(Table {
            config: self.config,
            topology,
            forks,
            pending,
            stats,
            signal: StopSignal::new(),
            state: TableState::Idle,
            workers: Vec::new(),
            failures: Vec::new(),
            monitor,
        })
    }
}

fn default_forks(fairness: FairnessMode) -> ForkFactory {
    match fairness {
        FairnessMode::Unordered => DefaultFork::factory(),
        FairnessMode::Fifo => FairFork::factory(),
    }
}

type Worker = JoinHandle<Result<(), ProtocolViolation>>;

/// A ring of philosophers and forks
pub struct Table {
    config: TableConfig,
    topology: Topology,
    forks: Vec<Arc<dyn Fork>>,
    pending: Vec<Box<dyn Philosopher>>,
    stats: Vec<Arc<SeatStats>>,
    signal: StopSignal,
    state: TableState,
    workers: Vec<(PhilosopherId, Worker)>,
    failures: Vec<WorkerFailure>,
    monitor: Option<Arc<OccupancyMonitor>>,
}

impl Table {
    /// Table of `seats` default philosophers with unordered forks
    ///
    /// # Errors
    ///
    /// Returns error if `seats < 2`
    pub fn new(seats: usize) -> TableResult<Self> {
        Self::with_config(TableConfig::new(seats))
    }

    /// Table of default philosophers
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid
    pub fn with_config(config: TableConfig) -> TableResult<Self> {
        TableBuilder::new(config).build()
    }

    /// Table with custom forks and philosophers
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid
    pub fn with_factories(
        config: TableConfig,
        forks: ForkFactory,
        philosophers: PhilosopherFactory,
    ) -> TableResult<Self> {
        TableBuilder::new(config)
            .with_forks(forks)
            .with_philosophers(philosophers)
            .build()
    }

    /// Builder for anything beyond the defaults
    #[must_use]
    pub fn builder(config: TableConfig) -> TableBuilder {
        TableBuilder::new(config)
    }

    /// Raise the running flag and spawn one worker per philosopher
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` if running, `Finished` once stopped, and
    /// `Spawn` if the OS refuses a thread (the table is then stopped)
    pub fn start(&mut self) -> TableResult<()> {
        match self.state {
            TableState::Idle => {}
            TableState::Running => return Err(TableError::AlreadyStarted),
            TableState::Stopped => return Err(TableError::Finished),
        }

        self.signal.start();
        self.state = TableState::Running;

        let wirings: Vec<Wiring> = self.topology.iter().copied().collect();
        let philosophers = std::mem::take(&mut self.pending);
        for (wiring, philosopher) in wirings.into_iter().zip(philosophers) {
            let id = wiring.philosopher;
            let seat = Seat::new(
                wiring,
                Arc::clone(&self.forks[wiring.left.index()]),
                Arc::clone(&self.forks[wiring.right.index()]),
                Arc::clone(&self.stats[id.index()]),
                Pacer::for_seat(self.config.timing, self.config.seed, id),
                self.signal.clone(),
            );

            let spawned = thread::Builder::new()
                .name(format!("philosopher-{}", id.index()))
                .spawn(move || run_worker(philosopher, seat));
            match spawned {
                Ok(handle) => self.workers.push((id, handle)),
                Err(err) => {
                    warn!(philosopher = %id, error = %err, "worker spawn failed");
                    self.stop();
                    return Err(TableError::Spawn {
                        philosopher: id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            seats = self.topology.seats(),
            fairness = %self.config.fairness,
            seed = self.config.seed,
            "table started"
        );
        Ok(())
    }

    /// Lower the running flag and join every worker
    ///
    /// Calling it again, or before `start`, only moves the table to
    /// `Stopped`. Counters read after this returns are final.
    pub fn stop(&mut self) {
        match self.state {
            TableState::Stopped => return,
            TableState::Idle => {
                self.pending.clear();
                self.state = TableState::Stopped;
                debug!("table stopped before start");
                return;
            }
            TableState::Running => {}
        }

        self.signal.stop();
        for (id, handle) in self.workers.drain(..) {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(violation)) => self.failures.push(WorkerFailure::Violation(violation)),
                Err(_) => {
                    warn!(philosopher = %id, "worker panicked");
                    self.failures.push(WorkerFailure::Panicked { philosopher: id });
                }
            }
        }
        self.state = TableState::Stopped;

        info!(
            total_meals = self.total_meals(),
            min_meals = self.min_meals(),
            max_meals = self.max_meals(),
            failures = self.failures.len(),
            "table stopped"
        );
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> TableState {
        self.state
    }

    /// Whether workers are cycling
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TableState::Running
    }

    /// Configuration the table was built with
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Ring wiring
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Number of seats
    #[must_use]
    pub fn seats(&self) -> usize {
        self.topology.seats()
    }

    /// Meals eaten by one philosopher
    #[must_use]
    pub fn meals(&self, philosopher: PhilosopherId) -> Option<u64> {
        self.stats.get(philosopher.index()).map(|s| s.meals())
    }

    /// Meals per philosopher in seat order
    #[must_use]
    pub fn meal_counts(&self) -> Vec<u64> {
        self.stats.iter().map(|s| s.meals()).collect()
    }

    /// Fewest meals eaten by any philosopher
    #[must_use]
    pub fn min_meals(&self) -> u64 {
        self.stats.iter().map(|s| s.meals()).min().unwrap_or(0)
    }

    /// Most meals eaten by any philosopher
    #[must_use]
    pub fn max_meals(&self) -> u64 {
        self.stats.iter().map(|s| s.meals()).max().unwrap_or(0)
    }

    /// Meals eaten by everyone
    #[must_use]
    pub fn total_meals(&self) -> u64 {
        self.stats.iter().map(|s| s.meals()).sum()
    }

    /// Snapshot of one philosopher's phase
    #[must_use]
    pub fn phase(&self, philosopher: PhilosopherId) -> Option<Phase> {
        self.stats.get(philosopher.index()).map(|s| s.phase())
    }

    /// Current holder of a fork
    #[must_use]
    pub fn holder(&self, fork: ForkId) -> Option<PhilosopherId> {
        self.forks.get(fork.index()).and_then(|f| f.holder())
    }

    /// Workers that ended early; complete once stopped
    #[must_use]
    pub fn failures(&self) -> &[WorkerFailure] {
        &self.failures
    }

    /// Workers still running
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Occupancy counters, if built with a monitor
    #[must_use]
    pub fn occupancy(&self) -> Option<OccupancyReport> {
        self.monitor.as_ref().map(|m| m.snapshot())
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("meals", &self.meal_counts())
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

fn run_worker(mut philosopher: Box<dyn Philosopher>, mut seat: Seat) -> Result<(), ProtocolViolation> {
    let id = seat.philosopher();
    debug!(philosopher = %id, "worker started");

    while seat.is_running() {
        seat.think();
        if !seat.is_running() {
            break;
        }

        seat.set_phase(Phase::Hungry);
        let outcome = philosopher.on_hungry(&mut seat);
        if seat.holds_any() {
            if outcome.is_ok() {
                warn!(philosopher = %id, "hunger hook returned with forks held");
            }
            seat.release_all();
        }
        seat.set_phase(Phase::Thinking);

        if let Err(violation) = outcome {
            warn!(philosopher = %id, %violation, "protocol violation, worker exiting");
            return Err(violation);
        }
    }

    debug!(philosopher = %id, meals = seat.meals(), "worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::philosopher::FnPhilosopher;
    use crate::seat::Side;
    use std::time::{Duration, Instant};

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_table_rejects_small_rings() {
        for seats in [0, 1] {
            assert!(matches!(
                Table::new(seats),
                Err(TableError::Config(CoreError::TooFewSeats { .. }))
            ));
        }
    }

    #[test]
    fn test_table_runs_and_stops() {
        let mut table = Table::new(5).unwrap();
        assert_eq!(table.state(), TableState::Idle);

        table.start().unwrap();
        assert!(table.is_running());
        wait_until(|| table.total_meals() >= 100);
        table.stop();

        assert_eq!(table.state(), TableState::Stopped);
        assert!(table.failures().is_empty());
        assert_eq!(table.meal_counts().iter().sum::<u64>(), table.total_meals());
        for id in table.topology().philosophers() {
            assert_eq!(table.phase(id), Some(Phase::Thinking));
        }
        for id in table.topology().forks() {
            assert_eq!(table.holder(id), None);
        }
    }

    #[test]
    fn test_two_seats_make_progress() {
        let config = TableConfig::new(2).with_fairness(FairnessMode::Fifo);
        let mut table = Table::with_config(config).unwrap();
        table.start().unwrap();
        wait_until(|| table.min_meals() >= 50);
        table.stop();
        assert!(table.max_meals() >= table.min_meals());
    }

    #[test]
    fn test_start_twice_and_restart_rejected() {
        let mut table = Table::new(3).unwrap();
        table.start().unwrap();
        assert!(matches!(table.start(), Err(TableError::AlreadyStarted)));
        table.stop();
        assert!(matches!(table.start(), Err(TableError::Finished)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut table = Table::new(4).unwrap();
        table.start().unwrap();
        wait_until(|| table.total_meals() > 0);
        table.stop();

        let counts = table.meal_counts();
        let (min, max, total) = (table.min_meals(), table.max_meals(), table.total_meals());
        table.stop();
        table.stop();

        assert_eq!(table.meal_counts(), counts);
        assert_eq!(table.min_meals(), min);
        assert_eq!(table.max_meals(), max);
        assert_eq!(table.total_meals(), total);
    }

    #[test]
    fn test_stop_before_start() {
        let mut table = Table::new(3).unwrap();
        table.stop();
        assert_eq!(table.state(), TableState::Stopped);
        assert_eq!(table.total_meals(), 0);
        assert!(matches!(table.start(), Err(TableError::Finished)));
    }

    #[test]
    fn test_monitor_sees_exclusive_forks() {
        let mut table = Table::builder(TableConfig::new(5)).with_monitor().build().unwrap();
        table.start().unwrap();
        wait_until(|| table.total_meals() >= 500);
        table.stop();

        let report = table.occupancy().unwrap();
        assert!(report.is_exclusive());
        assert_eq!(report.total_acquisitions(), 2 * table.total_meals());
    }

    #[test]
    fn test_unmonitored_table_has_no_report() {
        let table = Table::new(2).unwrap();
        assert!(table.occupancy().is_none());
    }

    #[test]
    fn test_out_of_order_philosopher_fails_alone() {
        // P0 holds F0 (left) and F1 (right); taking F1 first breaks the order.
        let philosophers: PhilosopherFactory = Box::new(|id| {
            if id.index() == 0 {
                Box::new(FnPhilosopher::new(|seat: &mut Seat| {
                    seat.acquire(Side::Right)?;
                    seat.acquire(Side::Left)?;
                    seat.release_both()
                })) as Box<dyn Philosopher>
            } else {
                Box::new(DefaultPhilosopher)
            }
        });
        let mut table =
            Table::with_factories(TableConfig::new(3), DefaultFork::factory(), philosophers).unwrap();

        table.start().unwrap();
        wait_until(|| table.meals(PhilosopherId::new(1)).unwrap_or(0) >= 100);
        wait_until(|| table.active_workers() == 2);
        table.stop();

        assert_eq!(
            table.failures(),
            &[WorkerFailure::Violation(ProtocolViolation::OutOfOrder {
                caller: PhilosopherId::new(0),
                requested: ForkId::new(0),
                held: ForkId::new(1),
            })]
        );
        assert_eq!(table.failures()[0].philosopher(), PhilosopherId::new(0));
        assert_eq!(table.meals(PhilosopherId::new(0)), Some(0));
        assert!(table.meals(PhilosopherId::new(2)).unwrap_or(0) > 0);
        assert_eq!(table.holder(ForkId::new(1)), None);
    }

    #[test]
    fn test_forks_left_held_are_released() {
        let philosophers: PhilosopherFactory = Box::new(|id| {
            if id.index() == 0 {
                Box::new(FnPhilosopher::new(|seat: &mut Seat| seat.acquire(Side::Left)))
                    as Box<dyn Philosopher>
            } else {
                Box::new(DefaultPhilosopher)
            }
        });
        let config = TableConfig::new(3).with_fairness(FairnessMode::Fifo);
        let mut table = Table::with_factories(config, FairFork::factory(), philosophers).unwrap();

        table.start().unwrap();
        wait_until(|| table.meals(PhilosopherId::new(2)).unwrap_or(0) >= 50);
        table.stop();

        assert!(table.failures().is_empty());
        assert_eq!(table.holder(ForkId::new(0)), None);
    }

    #[test]
    fn test_panicking_philosopher_is_reported() {
        let philosophers: PhilosopherFactory = Box::new(|id| {
            if id.index() == 1 {
                Box::new(FnPhilosopher::new(|seat: &mut Seat| {
                    seat.acquire_both()?;
                    panic!("spilled the wine");
                })) as Box<dyn Philosopher>
            } else {
                Box::new(DefaultPhilosopher)
            }
        });
        let config = TableConfig::new(3).with_fairness(FairnessMode::Fifo);
        let mut table = Table::with_factories(config, FairFork::factory(), philosophers).unwrap();

        table.start().unwrap();
        wait_until(|| table.active_workers() == 2);
        // The unwinding seat gave its forks back, so both neighbours eat.
        wait_until(|| {
            [0, 2]
                .iter()
                .all(|&i| table.meals(PhilosopherId::new(i)).unwrap_or(0) >= 10)
        });
        table.stop();

        assert_eq!(
            table.failures(),
            &[WorkerFailure::Panicked {
                philosopher: PhilosopherId::new(1)
            }]
        );
    }

    #[test]
    fn test_factory_must_honour_position() {
        let forks: ForkFactory = Box::new(|_| Arc::new(DefaultFork::new(ForkId::new(0))) as Arc<dyn Fork>);
        let result = Table::with_factories(TableConfig::new(3), forks, DefaultPhilosopher::factory());
        assert!(matches!(
            result,
            Err(TableError::Config(CoreError::Validation { .. }))
        ));
    }

    #[test]
    fn test_drop_joins_running_table() {
        let mut table = Table::new(4).unwrap();
        table.start().unwrap();
        wait_until(|| table.total_meals() > 0);
        drop(table);
    }

    #[test]
    fn test_worker_failure_display() {
        let failure = WorkerFailure::Panicked {
            philosopher: PhilosopherId::new(4),
        };
        assert_eq!(failure.to_string(), "P4 panicked");
        assert_eq!(failure.philosopher(), PhilosopherId::new(4));
    }
}
