//! Periodic progress logging.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::logging::format_count;

/// Thread-safe counter that logs an info line each time the count crosses an
/// interval boundary. The writer stage uses it to report pairs processed.
pub struct ProgressTracker {
    message: String,
    interval: u64,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Default logging interval in items.
    pub const DEFAULT_INTERVAL: u64 = 100_000;

    /// Creates a tracker with the given message prefix and the default
    /// interval.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), interval: Self::DEFAULT_INTERVAL, count: AtomicU64::new(0) }
    }

    /// Overrides the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Adds `additional` items and logs once per interval boundary crossed.
    pub fn record(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;
        for boundary in (prev / self.interval + 1)..=(new_count / self.interval) {
            info!("{} {}", self.message, format_count(boundary * self.interval));
        }
    }

    /// Logs the final count unless the last `record` call already reported it.
    pub fn log_final(&self) {
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 && count % self.interval != 0 {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }

    /// Items recorded so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_count_accumulates() {
        let tracker = ProgressTracker::new("Processed pairs").with_interval(100);
        tracker.record(50);
        tracker.record(75);
        assert_eq!(tracker.count(), 125);
        tracker.log_final();
    }

    #[test]
    fn test_zero_additional_is_a_no_op() {
        let tracker = ProgressTracker::new("Processed pairs").with_interval(10);
        tracker.record(0);
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_default_interval() {
        let tracker = ProgressTracker::new("Processed pairs");
        assert_eq!(tracker.interval, ProgressTracker::DEFAULT_INTERVAL);
    }

    #[test]
    fn test_concurrent_records_sum() {
        let tracker = Arc::new(ProgressTracker::new("Processed pairs").with_interval(1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    tracker.record(1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.count(), 800);
    }
}
