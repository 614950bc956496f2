//! Run reports.

use crate::harness::RunMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use symposium_core::RunId;
use symposium_table::{FairnessMode, OccupancyReport, Table, WorkerFailure};

/// Outcome of one harness run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,
    /// What the run waited for
    pub mode: RunMode,
    /// Seats at the table
    pub seats: usize,
    /// Fork arbitration used
    pub fairness: FairnessMode,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Time from start until the stop was requested
    pub elapsed: Duration,
    /// Meals per philosopher in seat order
    pub meals: Vec<u64>,
    /// Fewest meals
    pub min_meals: u64,
    /// Most meals
    pub max_meals: u64,
    /// All meals
    pub total_meals: u64,
    /// Workers that ended early
    pub failures: Vec<WorkerFailure>,
    /// Fork occupancy, when the table was monitored
    pub occupancy: Option<OccupancyReport>,
}

impl RunReport {
    /// Read the final counters of a stopped table
    #[must_use]
    pub fn from_table(
        run_id: RunId,
        mode: RunMode,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        table: &Table,
    ) -> Self {
        Self {
            run_id,
            mode,
            seats: table.seats(),
            fairness: table.config().fairness,
            started_at,
            elapsed,
            meals: table.meal_counts(),
            min_meals: table.min_meals(),
            max_meals: table.max_meals(),
            total_meals: table.total_meals(),
            failures: table.failures().to_vec(),
            occupancy: table.occupancy(),
        }
    }

    /// Meals per second
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total_meals as f64 / secs
    }

    /// Jain's fairness index over meals: 1.0 is perfectly even, `1/n` is one
    /// philosopher eating alone
    #[must_use]
    pub fn fairness_index(&self) -> f64 {
        let sum: f64 = self.meals.iter().map(|&m| m as f64).sum();
        let squares: f64 = self.meals.iter().map(|&m| (m as f64) * (m as f64)).sum();
        if squares == 0.0 {
            return 0.0;
        }
        (sum * sum) / (self.meals.len() as f64 * squares)
    }

    /// Whether the run reached its goal
    #[must_use]
    pub fn target_met(&self) -> bool {
        match self.mode {
            RunMode::Duration(limit) => self.elapsed >= limit,
            RunMode::TotalMeals(target) => self.total_meals >= target,
            RunMode::MinMeals(target) => self.min_meals >= target,
        }
    }

    /// No failed workers and no broken exclusion
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self
                .occupancy
                .as_ref()
                .is_none_or(OccupancyReport::is_exclusive)
    }

    /// Pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
