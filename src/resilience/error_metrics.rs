//! Outcome bookkeeping owned by a single circuit breaker.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Number of successful call durations kept for averaging.
pub const RESPONSE_TIME_WINDOW: usize = 100;

/// Counters and recent history of a breaker's calls.
///
/// `total_requests == success_requests + failed_requests` holds after every
/// update, and at most one of the two consecutive counters is nonzero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorMetrics {
    /// Calls that reached the operation
    pub total_requests: u64,
    /// Calls that failed (including timeouts)
    pub failed_requests: u64,
    /// Calls that succeeded
    pub success_requests: u64,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Successes since the last failure
    pub consecutive_successes: u32,
    /// Wall-clock time of the most recent failure
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Wall-clock time of the most recent success
    pub last_success_time: Option<DateTime<Utc>>,
    /// Failure counts keyed by failure kind name
    pub error_types: HashMap<String, u64>,
    /// Durations of the most recent successful calls, oldest first
    pub response_times: VecDeque<Duration>,
}

impl ErrorMetrics {
    /// Create empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call and its duration
    pub fn record_success(&mut self, elapsed: Duration) {
        self.total_requests += 1;
        self.success_requests += 1;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
        self.last_success_time = Some(Utc::now());

        if self.response_times.len() == RESPONSE_TIME_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(elapsed);
    }

    /// Record a failed call of the given kind
    pub fn record_failure(&mut self, kind: &str) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
        self.last_failure_time = Some(Utc::now());

        *self.error_types.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Success rate as a percentage, 0 when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        percentage(self.success_requests, self.total_requests)
    }

    /// Failure rate as a percentage, 0 when nothing was recorded
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed_requests, self.total_requests)
    }

    /// Mean of the buffered response times in seconds, 0.0 when empty
    pub fn avg_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }

        let total: f64 = self.response_times.iter().map(Duration::as_secs_f64).sum();
        total / self.response_times.len() as f64
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let metrics = ErrorMetrics::new();
        assert_eq!(metrics.success_rate(), 0.0);
        assert_eq!(metrics.failure_rate(), 0.0);
        assert_eq!(metrics.avg_response_time(), 0.0);
        assert!(metrics.last_failure_time.is_none());
    }

    #[test]
    fn test_consecutive_counters_are_exclusive() {
        let mut metrics = ErrorMetrics::new();

        metrics.record_failure("NetworkError");
        metrics.record_failure("NetworkError");
        assert_eq!(metrics.consecutive_failures, 2);
        assert_eq!(metrics.consecutive_successes, 0);

        metrics.record_success(Duration::from_millis(5));
        assert_eq!(metrics.consecutive_failures, 0);
        assert_eq!(metrics.consecutive_successes, 1);

        metrics.record_failure("TimeoutError");
        assert_eq!(metrics.consecutive_failures, 1);
        assert_eq!(metrics.consecutive_successes, 0);

        assert_eq!(metrics.total_requests, 4);
        assert_eq!(
            metrics.total_requests,
            metrics.success_requests + metrics.failed_requests
        );
    }

    #[test]
    fn test_error_types_are_counted_by_name() {
        let mut metrics = ErrorMetrics::new();
        metrics.record_failure("TimeoutError");
        metrics.record_failure("ServerError");
        metrics.record_failure("TimeoutError");

        assert_eq!(metrics.error_types.get("TimeoutError"), Some(&2));
        assert_eq!(metrics.error_types.get("ServerError"), Some(&1));
        assert!(metrics.last_failure_time.is_some());
    }

    #[test]
    fn test_rates() {
        let mut metrics = ErrorMetrics::new();
        metrics.record_success(Duration::from_millis(1));
        metrics.record_success(Duration::from_millis(1));
        metrics.record_success(Duration::from_millis(1));
        metrics.record_failure("ServerError");

        assert_eq!(metrics.success_rate(), 75.0);
        assert_eq!(metrics.failure_rate(), 25.0);
    }

    #[test]
    fn test_response_times_keep_most_recent_window() {
        let mut metrics = ErrorMetrics::new();
        for i in 0..150u64 {
            metrics.record_success(Duration::from_millis(i));
        }

        assert_eq!(metrics.response_times.len(), RESPONSE_TIME_WINDOW);
        assert_eq!(metrics.response_times.front(), Some(&Duration::from_millis(50)));
        assert_eq!(metrics.response_times.back(), Some(&Duration::from_millis(149)));

        // mean of 50..=149 ms
        assert!((metrics.avg_response_time() - 0.0995).abs() < 1e-9);
    }
}
