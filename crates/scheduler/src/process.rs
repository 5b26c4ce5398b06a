use std::time::Duration;

use tokio::time::Instant;

/// Cadence and budget for one scheduled process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub name: String,
    /// Target gap between cycle starts.
    pub interval: Duration,
    /// Expected API calls for one cycle, checked against the budget before
    /// the cycle starts.
    pub estimated_api_cost: u32,
    /// Sliding one-minute API-call budget for this process.
    pub max_api_calls_per_minute: u32,
    /// Hard cap on one cycle's wall time.
    pub timeout: Duration,
    /// Informational only; processes never preempt each other.
    pub priority: u8,
    pub enabled: bool,
}

impl ProcessConfig {
    #[must_use]
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            estimated_api_cost: 1,
            max_api_calls_per_minute: 60,
            timeout: Duration::from_secs(30),
            priority: 0,
            enabled: true,
        }
    }

    #[must_use]
    pub const fn with_api_budget(mut self, estimated_cost: u32, max_per_minute: u32) -> Self {
        self.estimated_api_cost = estimated_cost;
        self.max_api_calls_per_minute = max_per_minute;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Running counters for one process, updated after every cycle.
#[derive(Debug, Clone, Default)]
pub struct ProcessMetrics {
    pub total_runs: u64,
    pub total_failures: u64,
    pub consecutive_failures: u64,
    pub skipped_budget_cycles: u64,
    pub last_duration: Duration,
    /// Smoothed over time as (previous + latest) / 2.
    pub avg_duration: Duration,
    pub last_run_at: Option<Instant>,
    pub last_error: Option<String>,
}

impl ProcessMetrics {
    pub(crate) fn record_success(&mut self, started: Instant, duration: Duration) {
        self.total_runs += 1;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.record_timing(started, duration);
    }

    pub(crate) fn record_failure(&mut self, started: Instant, duration: Duration, error: String) {
        self.total_runs += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(error);
        self.record_timing(started, duration);
    }

    fn record_timing(&mut self, started: Instant, duration: Duration) {
        self.last_run_at = Some(started);
        self.last_duration = duration;
        self.avg_duration = if self.total_runs == 1 {
            duration
        } else {
            (self.avg_duration + duration) / 2
        };
    }
}

/// Point-in-time snapshot of one process, as reported by the scheduler.
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
    pub priority: u8,
    /// API calls this process has made in the last sliding minute.
    pub api_calls_last_minute: u32,
    pub metrics: ProcessMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_sets_the_average_directly() {
        let mut metrics = ProcessMetrics::default();
        metrics.record_success(Instant::now(), Duration::from_millis(100));
        assert_eq!(metrics.avg_duration, Duration::from_millis(100));
    }

    #[test]
    fn average_halves_toward_the_latest_duration() {
        let mut metrics = ProcessMetrics::default();
        metrics.record_success(Instant::now(), Duration::from_millis(100));
        metrics.record_success(Instant::now(), Duration::from_millis(300));
        assert_eq!(metrics.avg_duration, Duration::from_millis(200));
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let mut metrics = ProcessMetrics::default();
        let now = Instant::now();
        metrics.record_failure(now, Duration::ZERO, "boom".to_string());
        metrics.record_failure(now, Duration::ZERO, "boom".to_string());
        assert_eq!(metrics.consecutive_failures, 2);

        metrics.record_success(now, Duration::ZERO);
        assert_eq!(metrics.consecutive_failures, 0);
        assert_eq!(metrics.total_failures, 2);
        assert!(metrics.last_error.is_none());
    }
}
