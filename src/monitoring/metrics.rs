//! Extraction run counters.

use crate::core::ExecutionError;
use crate::plugin::report::ExtractionReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by amount.
    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters shared by every run of a host.
#[derive(Debug, Default)]
pub struct ExtractionMetrics {
    runs: Counter,
    plugins_succeeded: Counter,
    plugins_failed: Counter,
    plugins_timed_out: Counter,
    plugins_skipped: Counter,
    plugins_cancelled: Counter,
    run_time_ms: Counter,
}

/// Point-in-time copy of [`ExtractionMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub plugins_succeeded: u64,
    pub plugins_failed: u64,
    pub plugins_timed_out: u64,
    pub plugins_skipped: u64,
    pub plugins_cancelled: u64,
    pub run_time_ms: u64,
}

impl ExtractionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished run.
    pub fn record(&self, report: &ExtractionReport, succeeded: usize) {
        self.runs.inc();
        self.plugins_succeeded.add(succeeded as u64);

        for failure in report.failures.values() {
            match failure {
                ExecutionError::Failed(_) | ExecutionError::Panicked(_) => {
                    self.plugins_failed.inc()
                }
                ExecutionError::Timeout => self.plugins_timed_out.inc(),
                ExecutionError::DependencyUnavailable(_) => self.plugins_skipped.inc(),
                ExecutionError::Cancelled => self.plugins_cancelled.inc(),
            }
        }

        let elapsed = report.duration().num_milliseconds().max(0) as u64;
        self.run_time_ms.add(elapsed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.get(),
            plugins_succeeded: self.plugins_succeeded.get(),
            plugins_failed: self.plugins_failed.get(),
            plugins_timed_out: self.plugins_timed_out.get(),
            plugins_skipped: self.plugins_skipped.get(),
            plugins_cancelled: self.plugins_cancelled.get(),
            run_time_ms: self.run_time_ms.get(),
        }
    }
}
