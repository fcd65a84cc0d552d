//! Thread-safe run statistics
//!
//! Written by every request task and by the dispatcher's periodic rate
//! sampler, read by the presentation side. All four fields live behind a
//! single [`parking_lot::Mutex`]; every operation is a plain in-memory
//! field update and the aggregator never performs I/O.
//!
//! A run gets a fresh aggregator; pause and resume do not reset it.

use std::time::Duration;

use parking_lot::Mutex;

use super::executor::RequestOutcome;

/// Read-only copy of the run counters, safe to take at any time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Successfully completed requests since run start (monotonic)
    pub total_sent: u64,
    /// Failed requests since run start (monotonic)
    pub errors: u64,
    /// Most recent operator-visible error message (last-write-wins)
    pub last_error: Option<String>,
    /// Cumulative average rate: `total_sent / elapsed-since-run-start`,
    /// not an instantaneous measurement
    pub current_rate: f64,
}

/// Aggregates request outcomes for one run.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request outcome. Each dispatched request contributes
    /// exactly one call: a success bumps `total_sent`, a failure bumps
    /// `errors`, never both.
    pub fn record(&self, outcome: &RequestOutcome) {
        match outcome {
            RequestOutcome::Success => self.increment(),
            RequestOutcome::Failure(kind) => {
                if kind.suppressed() {
                    self.add_silent_error();
                } else {
                    self.add_error(kind.message());
                }
            }
        }
    }

    /// `total_sent += 1`
    pub fn increment(&self) {
        self.inner.lock().total_sent += 1;
    }

    /// `errors += 1` and replace the operator-visible last error.
    pub fn add_error(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.errors += 1;
        inner.last_error = Some(message.into());
    }

    /// `errors += 1` without touching `last_error`. Used for failure classes
    /// that are expected under load and must not reach any human-readable
    /// surface.
    pub fn add_silent_error(&self) {
        self.inner.lock().errors += 1;
    }

    /// Recompute the cumulative average rate for the given elapsed run time.
    pub fn refresh_rate(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.current_rate = inner.total_sent as f64 / secs;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }
}
