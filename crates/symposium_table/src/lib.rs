//! SYMPOSIUM Table Engine
//!
//! Runs N philosophers on OS threads around a ring of N forks. Every
//! philosopher acquires its lower-ranked fork first, which keeps the wait-for
//! graph acyclic no matter how philosophers or forks are customized.
//! `FairnessMode::Fifo` additionally serves fork waiters in arrival order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fork;
pub mod monitor;
pub mod philosopher;
pub mod seat;
pub mod signal;
pub mod table;
pub mod timing;

pub use config::{FairnessMode, TableConfig};
pub use error::{TableError, TableResult};
pub use fork::{DefaultFork, FairFork, Fork, ForkFactory};
pub use monitor::{ForkMetrics, MonitoredFork, OccupancyMonitor, OccupancyReport};
pub use philosopher::{DefaultPhilosopher, FnPhilosopher, Philosopher, PhilosopherFactory};
pub use seat::{Seat, Side};
pub use signal::StopSignal;
pub use table::{Table, TableBuilder, TableState, WorkerFailure};
pub use timing::{DelayRange, Pacer, Timing};
