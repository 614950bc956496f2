//! Occupancy monitor for forks.
//!
//! Wraps forks to count concurrent holders and acquisition waits. A correct
//! table never shows more than one holder per fork.

use crate::fork::{Fork, ForkFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use symposium_core::{ForkId, PhilosopherId, ProtocolViolation};

/// Metrics for one fork
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkMetrics {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Acquisitions that found the fork taken
    pub contended: u64,
    /// Total time spent blocked in acquire (nanoseconds)
    pub total_wait_nanos: u64,
    /// Longest single wait (nanoseconds)
    pub max_wait_nanos: u64,
    /// Most holders ever observed at once
    pub peak_holders: usize,
}

impl ForkMetrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acquisition
    pub fn record_acquisition(&mut self, wait: Duration, contended: bool) {
        let wait = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX);
        self.acquisitions += 1;
        if contended {
            self.contended += 1;
        }
        self.total_wait_nanos = self.total_wait_nanos.saturating_add(wait);
        self.max_wait_nanos = self.max_wait_nanos.max(wait);
    }

    /// Share of acquisitions that had to wait (0.0 - 1.0)
    #[must_use]
    pub fn contention_rate(&self) -> f64 {
        if self.acquisitions == 0 {
            return 0.0;
        }
        self.contended as f64 / self.acquisitions as f64
    }

    /// Mean wait per acquisition
    #[must_use]
    pub fn mean_wait(&self) -> Duration {
        if self.acquisitions == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_wait_nanos / self.acquisitions)
    }

    /// Longest single wait
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_nanos(self.max_wait_nanos)
    }
}

#[derive(Debug, Default)]
struct ForkCell {
    holders: AtomicUsize,
    peak: AtomicUsize,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    total_wait: AtomicU64,
    max_wait: AtomicU64,
}

/// Point-in-time view of a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyReport {
    /// Per-fork metrics in ring order
    pub forks: Vec<ForkMetrics>,
    /// Times a fork was observed with more than one holder
    pub violations: u64,
}

impl OccupancyReport {
    /// Whether mutual exclusion held for every fork
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.violations == 0 && self.forks.iter().all(|f| f.peak_holders <= 1)
    }

    /// Acquisitions across all forks
    #[must_use]
    pub fn total_acquisitions(&self) -> u64 {
        self.forks.iter().map(|f| f.acquisitions).sum()
    }

    /// Longest wait across all forks
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.forks
            .iter()
            .map(ForkMetrics::max_wait)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

/// Counts holders and waits for every fork of a table
#[derive(Debug)]
pub struct OccupancyMonitor {
    cells: Vec<ForkCell>,
    violations: AtomicU64,
}

impl OccupancyMonitor {
    /// Create a monitor for `forks` forks
    #[must_use]
    pub fn new(forks: usize) -> Self {
        Self {
            cells: (0..forks).map(|_| ForkCell::default()).collect(),
            violations: AtomicU64::new(0),
        }
    }

    /// Wrap every fork a factory builds
    #[must_use]
    pub fn wrap(self: &Arc<Self>, factory: ForkFactory) -> ForkFactory {
        let monitor = Arc::clone(self);
        Box::new(move |id| {
            Arc::new(MonitoredFork::new(factory(id), Arc::clone(&monitor))) as Arc<dyn Fork>
        })
    }

    fn enter(&self, fork: ForkId, wait: Duration, contended: bool) {
        let Some(cell) = self.cells.get(fork.index()) else {
            return;
        };

        let holders = cell.holders.fetch_add(1, Ordering::SeqCst) + 1;
        cell.peak.fetch_max(holders, Ordering::SeqCst);
        if holders > 1 {
            self.violations.fetch_add(1, Ordering::SeqCst);
            tracing::error!(fork = %fork, holders, "mutual exclusion broken");
        }

        let wait = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX);
        cell.acquisitions.fetch_add(1, Ordering::Relaxed);
        if contended {
            cell.contended.fetch_add(1, Ordering::Relaxed);
        }
        cell.total_wait.fetch_add(wait, Ordering::Relaxed);
        cell.max_wait.fetch_max(wait, Ordering::Relaxed);
    }

    fn leave(&self, fork: ForkId) {
        if let Some(cell) = self.cells.get(fork.index()) {
            cell.holders.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Current holder count of a fork
    #[must_use]
    pub fn holders(&self, fork: ForkId) -> usize {
        self.cells
            .get(fork.index())
            .map_or(0, |cell| cell.holders.load(Ordering::SeqCst))
    }

    /// Times a fork was observed with more than one holder
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::SeqCst)
    }

    /// Capture all counters
    #[must_use]
    pub fn snapshot(&self) -> OccupancyReport {
        let forks = self
            .cells
            .iter()
            .map(|cell| ForkMetrics {
                acquisitions: cell.acquisitions.load(Ordering::Relaxed),
                contended: cell.contended.load(Ordering::Relaxed),
                total_wait_nanos: cell.total_wait.load(Ordering::Relaxed),
                max_wait_nanos: cell.max_wait.load(Ordering::Relaxed),
                peak_holders: cell.peak.load(Ordering::SeqCst),
            })
            .collect();

        OccupancyReport {
            forks,
            violations: self.violations(),
        }
    }
}

/// Fork wrapper reporting to an [`OccupancyMonitor`]
///
/// The holder count goes up only after the inner fork has recorded the
/// holder, and down before the inner fork lets the next holder in.
pub struct MonitoredFork {
    inner: Arc<dyn Fork>,
    monitor: Arc<OccupancyMonitor>,
}

impl MonitoredFork {
    /// Wrap a fork
    #[must_use]
    pub fn new(inner: Arc<dyn Fork>, monitor: Arc<OccupancyMonitor>) -> Self {
        Self { inner, monitor }
    }
}

impl Fork for MonitoredFork {
    fn id(&self) -> ForkId {
        self.inner.id()
    }

    fn acquire(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        let contended = self.inner.is_held();
        let started = Instant::now();
        self.inner.acquire(who)?;
        self.monitor.enter(self.id(), started.elapsed(), contended);
        Ok(())
    }

    fn release(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        // Only the holder can change a held fork, so this check is stable.
        if self.inner.holder() == Some(who) {
            self.monitor.leave(self.id());
        }
        self.inner.release(who)
    }

    fn holder(&self) -> Option<PhilosopherId> {
        self.inner.holder()
    }

    fn waiting(&self) -> usize {
        self.inner.waiting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fork::DefaultFork;

    fn p(i: usize) -> PhilosopherId {
        PhilosopherId::new(i)
    }

    #[test]
    fn test_metrics_new() {
        let metrics = ForkMetrics::new();
        assert_eq!(metrics.acquisitions, 0);
        assert_eq!(metrics.contention_rate(), 0.0);
        assert_eq!(metrics.mean_wait(), Duration::ZERO);
    }

    #[test]
    fn test_metrics_record() {
        let mut metrics = ForkMetrics::new();
        metrics.record_acquisition(Duration::from_nanos(100), false);
        metrics.record_acquisition(Duration::from_nanos(300), true);

        assert_eq!(metrics.acquisitions, 2);
        assert_eq!(metrics.contended, 1);
        assert_eq!(metrics.contention_rate(), 0.5);
        assert_eq!(metrics.mean_wait(), Duration::from_nanos(200));
        assert_eq!(metrics.max_wait(), Duration::from_nanos(300));
    }

    #[test]
    fn test_monitored_fork_counts_holders() {
        let monitor = Arc::new(OccupancyMonitor::new(2));
        let fork = MonitoredFork::new(Arc::new(DefaultFork::new(ForkId::new(1))), Arc::clone(&monitor));

        fork.acquire(p(0)).unwrap();
        assert_eq!(monitor.holders(ForkId::new(1)), 1);
        fork.release(p(0)).unwrap();
        assert_eq!(monitor.holders(ForkId::new(1)), 0);

        let report = monitor.snapshot();
        assert_eq!(report.forks[1].acquisitions, 1);
        assert_eq!(report.forks[1].peak_holders, 1);
        assert_eq!(report.forks[0].acquisitions, 0);
        assert!(report.is_exclusive());
    }

    #[test]
    fn test_monitored_fork_failed_release_keeps_count() {
        let monitor = Arc::new(OccupancyMonitor::new(1));
        let fork = MonitoredFork::new(Arc::new(DefaultFork::new(ForkId::new(0))), Arc::clone(&monitor));

        fork.acquire(p(0)).unwrap();
        assert!(fork.release(p(1)).is_err());
        assert_eq!(monitor.holders(ForkId::new(0)), 1);
        assert_eq!(fork.holder(), Some(p(0)));
    }

    #[test]
    fn test_monitor_detects_broken_fork() {
        // A fork that never blocks: two holders at once must be flagged.
        struct Leaky;
        impl Fork for Leaky {
            fn id(&self) -> ForkId {
                ForkId::new(0)
            }
            fn acquire(&self, _who: PhilosopherId) -> Result<(), ProtocolViolation> {
                Ok(())
            }
            fn release(&self, _who: PhilosopherId) -> Result<(), ProtocolViolation> {
                Ok(())
            }
            fn holder(&self) -> Option<PhilosopherId> {
                Some(PhilosopherId::new(0))
            }
            fn waiting(&self) -> usize {
                0
            }
        }

        let monitor = Arc::new(OccupancyMonitor::new(1));
        let fork = MonitoredFork::new(Arc::new(Leaky), Arc::clone(&monitor));
        fork.acquire(p(0)).unwrap();
        fork.acquire(p(1)).unwrap();

        assert_eq!(monitor.violations(), 1);
        assert!(!monitor.snapshot().is_exclusive());
    }

    #[test]
    fn test_wrap_factory() {
        let monitor = Arc::new(OccupancyMonitor::new(3));
        let factory = monitor.wrap(DefaultFork::factory());
        let fork = factory(ForkId::new(2));

        fork.acquire(p(2)).unwrap();
        fork.release(p(2)).unwrap();

        let report = monitor.snapshot();
        assert_eq!(report.total_acquisitions(), 1);
        assert_eq!(report.forks[2].acquisitions, 1);
    }

    #[test]
    fn test_out_of_range_fork_ignored() {
        let monitor = Arc::new(OccupancyMonitor::new(1));
        let fork = MonitoredFork::new(Arc::new(DefaultFork::new(ForkId::new(7))), Arc::clone(&monitor));
        fork.acquire(p(0)).unwrap();
        fork.release(p(0)).unwrap();
        assert_eq!(monitor.snapshot().total_acquisitions(), 0);
    }
}
