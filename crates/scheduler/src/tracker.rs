use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window counter of API calls a process has made in the last
/// minute. Times are passed in explicitly so budget decisions stay
/// deterministic under test.
#[derive(Debug, Default)]
pub struct ApiCallTracker {
    calls: VecDeque<(Instant, u32)>,
}

impl ApiCallTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` calls made at `now`.
    pub fn record(&mut self, now: Instant, count: u32) {
        if count > 0 {
            self.calls.push_back((now, count));
        }
        self.evict(now);
    }

    /// Calls made within the window ending at `now`.
    pub fn used_in_window(&mut self, now: Instant) -> u32 {
        self.evict(now);
        self.calls.iter().map(|(_, count)| count).sum()
    }

    /// True when running a cycle estimated at `estimated_cost` calls would
    /// push the window total past `budget`.
    pub fn would_exceed(&mut self, now: Instant, estimated_cost: u32, budget: u32) -> bool {
        self.used_in_window(now) + estimated_cost > budget
    }

    fn evict(&mut self, now: Instant) {
        while let Some((at, _)) = self.calls.front() {
            if now.duration_since(*at) >= WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_calls_inside_the_window() {
        let mut tracker = ApiCallTracker::new();
        let t0 = Instant::now();
        tracker.record(t0, 3);
        tracker.record(t0 + Duration::from_secs(10), 2);
        assert_eq!(tracker.used_in_window(t0 + Duration::from_secs(20)), 5);
    }

    #[test]
    fn old_calls_fall_out_of_the_window() {
        let mut tracker = ApiCallTracker::new();
        let t0 = Instant::now();
        tracker.record(t0, 3);
        tracker.record(t0 + Duration::from_secs(30), 2);
        assert_eq!(tracker.used_in_window(t0 + Duration::from_secs(61)), 2);
        assert_eq!(tracker.used_in_window(t0 + Duration::from_secs(91)), 0);
    }

    #[test]
    fn budget_check_includes_the_estimated_cost() {
        let mut tracker = ApiCallTracker::new();
        let t0 = Instant::now();
        tracker.record(t0, 9);
        assert!(!tracker.would_exceed(t0, 1, 10));
        assert!(tracker.would_exceed(t0, 2, 10));
    }

    #[test]
    fn budget_frees_up_as_the_window_slides() {
        let mut tracker = ApiCallTracker::new();
        let t0 = Instant::now();
        tracker.record(t0, 10);
        assert!(tracker.would_exceed(t0 + Duration::from_secs(59), 1, 10));
        assert!(!tracker.would_exceed(t0 + Duration::from_secs(60), 1, 10));
    }

    #[test]
    fn zero_count_records_nothing() {
        let mut tracker = ApiCallTracker::new();
        let t0 = Instant::now();
        tracker.record(t0, 0);
        assert_eq!(tracker.used_in_window(t0), 0);
    }
}
