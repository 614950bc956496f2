//! Run harness.
//!
//! The table runs on a dedicated OS thread that reports back over a oneshot
//! channel. The harness awaits that channel under `tokio::time::timeout`, so
//! a run that never finishes surfaces as [`HarnessError::Liveness`] instead
//! of hanging the caller. On timeout the driver thread is told to give up
//! and is left to stop the table on its own.

use crate::error::{HarnessError, HarnessResult};
use crate::report::RunReport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use symposium_core::RunId;
use symposium_table::{StopSignal, Table};
use tokio::sync::oneshot;
use tracing::{info, warn};

/// When a run is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Run for a wall-clock duration
    Duration(Duration),
    /// Run until all philosophers together ate this many meals
    TotalMeals(u64),
    /// Run until every philosopher ate at least this many meals
    MinMeals(u64),
}

impl RunMode {
    /// Whether a table with these counters has finished
    #[must_use]
    pub fn is_complete(&self, elapsed: Duration, table: &Table) -> bool {
        match *self {
            Self::Duration(limit) => elapsed >= limit,
            Self::TotalMeals(target) => table.total_meals() >= target,
            Self::MinMeals(target) => table.min_meals() >= target,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration(d) => write!(f, "for {d:?}"),
            Self::TotalMeals(n) => write!(f, "until {n} meals"),
            Self::MinMeals(n) => write!(f, "until everyone ate {n} meals"),
        }
    }
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Duration(Duration::from_secs(1))
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// When the run is over
    pub mode: RunMode,
    /// Bound on the whole run, stop included
    pub timeout: Duration,
    /// How often the driver checks the counters
    pub poll_interval: Duration,
}

impl RunConfig {
    /// Create a run config
    #[must_use]
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(1),
        }
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check for zero targets and timeouts
    ///
    /// # Errors
    ///
    /// Returns `Config` if the run could never finish or never be observed
    pub fn validate(&self) -> HarnessResult<()> {
        if self.timeout.is_zero() {
            return Err(HarnessError::Config("timeout must be positive".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(HarnessError::Config(
                "poll interval must be positive".to_string(),
            ));
        }
        match self.mode {
            RunMode::TotalMeals(0) | RunMode::MinMeals(0) => Err(HarnessError::Config(
                "meal target must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(RunMode::default())
    }
}

/// Drives tables to completion under a timeout
#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: RunConfig,
}

impl Harness {
    /// Create a harness
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Start the table, wait for the run mode, stop, and report
    ///
    /// # Errors
    ///
    /// Returns `Liveness` if the timeout elapses first, `Table` if the table
    /// cannot start, and `Config` for an invalid run config
    pub async fn run(&self, table: Table) -> HarnessResult<RunReport> {
        self.config.validate()?;

        let run_id = RunId::new();
        let mode = self.config.mode;
        let poll = self.config.poll_interval;
        let progress = Arc::new(AtomicU64::new(0));
        let watch = StopSignal::new();
        watch.start();

        info!(run = %run_id, seats = table.seats(), %mode, "run starting");

        let (tx, rx) = oneshot::channel();
        let driver_progress = Arc::clone(&progress);
        let driver_watch = watch.clone();
        std::thread::Builder::new()
            .name(format!("harness-{run_id}"))
            .spawn(move || {
                let outcome = drive(table, run_id, mode, poll, &driver_progress, &driver_watch);
                // The receiver is gone once the harness has timed out.
                let _ = tx.send(outcome);
            })
            .map_err(|err| HarnessError::Driver(err.to_string()))?;

        match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(outcome)) => {
                let report = outcome?;
                info!(
                    run = %run_id,
                    total_meals = report.total_meals,
                    min_meals = report.min_meals,
                    elapsed = ?report.elapsed,
                    "run finished"
                );
                Ok(report)
            }
            Ok(Err(_)) => Err(HarnessError::Driver(
                "driver exited without a report".to_string(),
            )),
            Err(_) => {
                watch.stop();
                let meals = progress.load(Ordering::Acquire);
                warn!(run = %run_id, timeout = ?self.config.timeout, meals, "liveness failure");
                Err(HarnessError::Liveness {
                    timeout: self.config.timeout,
                    meals,
                })
            }
        }
    }
}

fn drive(
    mut table: Table,
    run_id: RunId,
    mode: RunMode,
    poll: Duration,
    progress: &AtomicU64,
    watch: &StopSignal,
) -> HarnessResult<RunReport> {
    let started_at = Utc::now();
    let started = Instant::now();
    table.start()?;

    loop {
        progress.store(table.total_meals(), Ordering::Release);
        if mode.is_complete(started.elapsed(), &table) || !watch.is_running() {
            break;
        }
        // A philosopher that quit can never reach a per-philosopher target.
        if matches!(mode, RunMode::MinMeals(_)) && table.active_workers() < table.seats() {
            break;
        }
        std::thread::sleep(poll);
    }

    let elapsed = started.elapsed();
    table.stop();
    progress.store(table.total_meals(), Ordering::Release);
    Ok(RunReport::from_table(run_id, mode, started_at, elapsed, &table))
}

/// Run a table for `duration`, failing if the run and stop exceed `timeout`
///
/// # Errors
///
/// Returns `Liveness` if the timeout elapses first
pub async fn run_for(table: Table, duration: Duration, timeout: Duration) -> HarnessResult<RunReport> {
    Harness::new(RunConfig::new(RunMode::Duration(duration)).with_timeout(timeout))
        .run(table)
        .await
}

/// Run a table until `target` total meals, failing after `timeout`
///
/// # Errors
///
/// Returns `Liveness` if the timeout elapses first
pub async fn run_until_meals(table: Table, target: u64, timeout: Duration) -> HarnessResult<RunReport> {
    Harness::new(RunConfig::new(RunMode::TotalMeals(target)).with_timeout(timeout))
        .run(table)
        .await
}
