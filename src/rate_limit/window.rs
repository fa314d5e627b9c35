//! Sliding window ledger for a single rate limit rule.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::rate_limit::RateLimit;

/// A sliding window rate limiter.
///
/// Tracks admission timestamps within a rolling window and enforces the
/// rule's quota. Every method takes the current instant explicitly so that
/// several windows can be evaluated against the same "now".
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    /// Admission timestamps, oldest first
    requests: VecDeque<Instant>,
    limit: RateLimit,
}

impl SlidingWindow {
    /// Create an empty window for the given rule.
    pub fn new(limit: RateLimit) -> Self {
        Self {
            requests: VecDeque::with_capacity(limit.quota() as usize),
            limit,
        }
    }

    /// The rule this window enforces.
    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Drop timestamps that have left the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.limit.window();
        while let Some(oldest) = self.requests.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of admissions still inside the window at `now`.
    pub fn usage(&self, now: Instant) -> u32 {
        let window = self.limit.window();
        self.requests
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < window)
            .count() as u32
    }

    /// Remaining admissions at `now`.
    pub fn remaining(&self, now: Instant) -> u32 {
        self.limit.quota().saturating_sub(self.usage(now))
    }

    /// Time until another admission fits, or `None` if one fits now.
    pub fn wait_time(&self, now: Instant) -> Option<Duration> {
        if self.usage(now) < self.limit.quota() {
            None
        } else {
            Some(self.reset_in(now))
        }
    }

    /// Time until the oldest admission inside the window expires.
    ///
    /// Zero when the window holds no live admissions. Saturates at
    /// [`Duration::MAX`] when the window end is past the clock's range.
    pub fn reset_in(&self, now: Instant) -> Duration {
        let window = self.limit.window();
        self.requests
            .iter()
            .find(|ts| now.saturating_duration_since(**ts) < window)
            .map(|oldest| {
                oldest
                    .checked_add(window)
                    .map_or(Duration::MAX, |end| end.saturating_duration_since(now))
            })
            .unwrap_or_default()
    }

    /// Record an admission at `now`.
    pub fn record(&mut self, now: Instant) {
        self.requests.push_back(now);
    }

    /// Forget every recorded admission.
    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(quota: u32, millis: u64) -> SlidingWindow {
        SlidingWindow::new(RateLimit::new(quota, Duration::from_millis(millis)).unwrap())
    }

    #[test]
    fn test_allows_within_limit() {
        let mut limiter = window(3, 1000);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.wait_time(now).is_none());
            limiter.record(now);
        }
        assert_eq!(limiter.wait_time(now), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_frees_after_window() {
        let mut limiter = window(2, 50);
        let start = Instant::now();

        limiter.record(start);
        limiter.record(start + Duration::from_millis(20));
        assert_eq!(
            limiter.wait_time(start + Duration::from_millis(30)),
            Some(Duration::from_millis(20))
        );

        let later = start + Duration::from_millis(50);
        assert_eq!(limiter.usage(later), 1);
        assert!(limiter.wait_time(later).is_none());
    }

    #[test]
    fn test_remaining() {
        let mut limiter = window(3, 1000);
        let now = Instant::now();

        assert_eq!(limiter.remaining(now), 3);
        limiter.record(now);
        assert_eq!(limiter.remaining(now), 2);
        limiter.record(now);
        assert_eq!(limiter.remaining(now), 1);
    }

    #[test]
    fn test_prune_drops_expired() {
        let mut limiter = window(5, 100);
        let start = Instant::now();

        limiter.record(start);
        limiter.record(start + Duration::from_millis(60));
        limiter.prune(start + Duration::from_millis(120));

        assert_eq!(limiter.requests.len(), 1);
        assert_eq!(
            limiter.reset_in(start + Duration::from_millis(120)),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_reset_in_empty_is_zero() {
        let limiter = window(1, 100);
        assert_eq!(limiter.reset_in(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_unbounded_window_saturates() {
        let mut limiter = SlidingWindow::new(RateLimit::new(1, Duration::MAX).unwrap());
        let now = Instant::now();

        limiter.record(now);
        assert_eq!(limiter.usage(now), 1);
        assert_eq!(limiter.reset_in(now), Duration::MAX);
        assert_eq!(limiter.wait_time(now), Some(Duration::MAX));
    }
}
