//! Run counters and the consumer-liveness signal
//!
//! All fields are lock-free atomics updated with relaxed ordering: the
//! counters are observability only, and the activity timestamp is a
//! last-writer-wins heuristic, not an ordering-critical value. The verdict
//! of a run never depends on anything in here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared counters for one harness run.
///
/// The produced counter is single-writer (the publish driver); the observed
/// counter and error counters are bumped from arbitrary poll worker threads.
/// `record_observed` also advances the activity timestamp that the drain
/// phase uses to detect stalled consumption.
pub struct RunMetrics {
    origin: Instant,
    produced: AtomicU64,
    observed: AtomicU64,
    publish_errors: AtomicU64,
    fetch_errors: AtomicU64,
    last_activity_ms: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            produced: AtomicU64::new(0),
            observed: AtomicU64::new(0),
            publish_errors: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one observed message and refreshes the liveness timestamp.
    pub fn record_observed(&self) {
        self.observed.fetch_add(1, Ordering::Relaxed);
        self.last_activity_ms
            .store(self.elapsed_ms(), Ordering::Relaxed);
    }

    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since a poll worker last observed a message.
    ///
    /// Before the first observation this measures from run start, so a run
    /// where consumption never happens at all goes stale on its own.
    pub fn idle_time(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn observed(&self) -> u64 {
        self.observed.load(Ordering::Relaxed)
    }

    pub fn publish_errors(&self) -> u64 {
        self.publish_errors.load(Ordering::Relaxed)
    }

    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn counters_accumulate() {
        let metrics = RunMetrics::new();
        metrics.record_produced();
        metrics.record_produced();
        metrics.record_observed();
        metrics.record_fetch_error();

        assert_eq!(metrics.produced(), 2);
        assert_eq!(metrics.observed(), 1);
        assert_eq!(metrics.fetch_errors(), 1);
        assert_eq!(metrics.publish_errors(), 0);
    }

    #[test]
    fn observation_resets_idle_time() {
        let metrics = RunMetrics::new();
        thread::sleep(Duration::from_millis(30));
        assert!(metrics.idle_time() >= Duration::from_millis(30));

        metrics.record_observed();
        assert!(metrics.idle_time() < Duration::from_millis(30));
    }
}
