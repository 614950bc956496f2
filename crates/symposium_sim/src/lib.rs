//! SYMPOSIUM Run Harness
//!
//! Drives a [`symposium_table::Table`] for a duration or until a meal target
//! is reached, under a timeout that turns a stuck run into a liveness
//! failure. Also ships the adversarial scenarios used by tests, benches and
//! the CLI, and the serialisable run report.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod harness;
pub mod report;
pub mod scenario;

pub use error::{HarnessError, HarnessResult};
pub use harness::{Harness, RunConfig, RunMode, run_for, run_until_meals};
pub use report::RunReport;
pub use scenario::{DelayedPhilosopher, GreedyPhilosopher, NoisyFork, Scenario};
