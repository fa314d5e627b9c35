//! Multi-rule rate limiter shared by concurrent callers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::GateError;
use crate::rate_limit::{RateLimit, SlidingWindow, limits};

/// Point-in-time usage of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStatus {
    /// Maximum admissions per window.
    pub quota: u32,
    /// Admissions currently inside the window.
    pub used: u32,
    /// Admissions still available.
    pub remaining: u32,
    /// Window length.
    pub window: Duration,
    /// Time until the oldest admission leaves the window.
    pub reset_in: Duration,
}

impl RuleStatus {
    /// [`RuleStatus::reset_in`] in fractional seconds.
    pub fn reset_in_seconds(&self) -> f64 {
        self.reset_in.as_secs_f64()
    }
}

/// Rate limiter enforcing an ordered set of rules simultaneously.
///
/// Clones share the same ledgers, so a single limiter can be handed to
/// every task issuing requests against the same upstream quota.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    ledger: Arc<Mutex<Ledger>>,
}

impl RateLimiter {
    /// Create a limiter from an ordered list of rules.
    ///
    /// Fails when the list is empty.
    pub fn new(rules: Vec<RateLimit>) -> Result<Self, GateError> {
        if rules.is_empty() {
            return Err(GateError::config("rate limiter needs at least one rule"));
        }
        debug!(rules = ?rules, "rate limiter initialized");
        Ok(Self {
            ledger: Arc::new(Mutex::new(Ledger::new(rules))),
        })
    }

    /// Wait until every rule has room, then record one admission.
    ///
    /// Dropping the returned future while it is waiting records nothing.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut ledger = self.ledger.lock().await;
                match ledger.try_acquire(Instant::now()) {
                    Ok(()) => {
                        debug!("rate limit check passed");
                        return;
                    }
                    Err(wait) => wait,
                }
            };
            debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`RateLimiter::acquire`], but give up after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<(), GateError> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| GateError::Timeout)
    }

    /// Record an admission if every rule has room right now.
    ///
    /// Returns `Err(wait_time)` otherwise, without recording anything.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        self.ledger.lock().await.try_acquire(Instant::now())
    }

    /// Current usage of every rule, in rule order.
    pub async fn status(&self) -> Vec<RuleStatus> {
        self.ledger.lock().await.status(Instant::now())
    }

    /// Forget all recorded admissions. Rules are kept.
    pub async fn reset(&self) {
        self.ledger.lock().await.clear();
        info!("rate limiter reset");
    }

    /// The configured rules, in evaluation order.
    pub async fn rules(&self) -> Vec<RateLimit> {
        self.ledger
            .lock()
            .await
            .windows
            .iter()
            .map(SlidingWindow::limit)
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(limits::development_key()))),
        }
    }
}

/// The per-rule windows guarded by the limiter's mutex.
#[derive(Debug)]
struct Ledger {
    windows: Vec<SlidingWindow>,
}

impl Ledger {
    fn new(rules: Vec<RateLimit>) -> Self {
        Self {
            windows: rules.into_iter().map(SlidingWindow::new).collect(),
        }
    }

    /// Admit at `now` if all rules allow it, else report the longest wait.
    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        for window in &mut self.windows {
            window.prune(now);
        }

        let wait = self
            .windows
            .iter()
            .filter_map(|window| window.wait_time(now))
            .max();

        match wait {
            Some(wait) => Err(wait),
            None => {
                for window in &mut self.windows {
                    window.record(now);
                }
                Ok(())
            }
        }
    }

    fn status(&self, now: Instant) -> Vec<RuleStatus> {
        self.windows
            .iter()
            .map(|window| {
                let limit = window.limit();
                let used = window.usage(now);
                RuleStatus {
                    quota: limit.quota(),
                    used,
                    remaining: limit.quota().saturating_sub(used),
                    window: limit.window(),
                    reset_in: window.reset_in(now),
                }
            })
            .collect()
    }

    fn clear(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limiter(rules: &[(u32, u64)]) -> RateLimiter {
        RateLimiter::new(
            rules
                .iter()
                .map(|(q, ms)| RateLimit::new(*q, Duration::from_millis(*ms)).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_rules() {
        assert!(RateLimiter::new(Vec::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_acquires_do_not_block() {
        let limiter = limiter(&[(5, 1000)]);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_acquire_waits_for_window() {
        let limiter = limiter(&[(2, 1000)]);
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.acquire().await;
        limiter.acquire().await;

        // The first admission leaves the window at t=1000ms.
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_slowest_violated_rule() {
        let limiter = limiter(&[(1, 100), (2, 1000)]);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_history() {
        let limiter = limiter(&[(3, 60_000)]);

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(limiter.try_acquire().await.is_err());

        limiter.reset().await;
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.rules().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_usage() {
        let limiter = limiter(&[(3, 1000), (10, 5000)]);

        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(400)).await;
        limiter.acquire().await;

        let status = limiter.status().await;
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].quota, 3);
        assert_eq!(status[0].used, 2);
        assert_eq!(status[0].remaining, 1);
        assert_eq!(status[0].window, Duration::from_secs(1));
        assert_eq!(status[0].reset_in, Duration::from_millis(600));
        assert_eq!(status[1].remaining, 8);

        // Status is read-only.
        assert_eq!(limiter.status().await, status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_window_reports_without_overflow() {
        let rule: RateLimit =
            serde_json::from_str(r#"{"quota": 1, "window_seconds": 1e19}"#).unwrap();
        let limiter = RateLimiter::new(vec![rule]).unwrap();
        limiter.acquire().await;

        let status = limiter.status().await;
        assert_eq!(status[0].used, 1);
        assert_eq!(status[0].reset_in, Duration::MAX);
        assert_eq!(limiter.try_acquire().await, Err(Duration::MAX));

        let err = limiter
            .acquire_timeout(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Timeout));
        assert_eq!(limiter.status().await[0].used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_not_blocked_by_waiter() {
        let limiter = limiter(&[(1, 10_000)]);
        limiter.acquire().await;

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::task::yield_now().await;

        let status = limiter.status().await;
        assert_eq!(status[0].used, 1);
        assert!(!waiter.is_finished());

        waiter.await.unwrap();
        assert_eq!(limiter.status().await[0].used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_acquire_records_nothing() {
        let limiter = limiter(&[(1, 1000)]);
        limiter.acquire().await;

        let result = limiter.acquire_timeout(Duration::from_millis(200)).await;
        assert!(matches!(result, Err(GateError::Timeout)));

        let status = limiter.status().await;
        assert_eq!(status[0].used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_respect_quota() {
        let limiter = limiter(&[(2, 1000)]);
        let start = Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        assert!(admitted[1] < Duration::from_millis(1000));
        assert!(admitted[2] >= Duration::from_millis(1000));
        assert!(admitted[4] >= Duration::from_millis(2000));
    }

    proptest! {
        #[test]
        fn test_rules_hold_at_every_tick(
            q1 in 1u32..5,
            w1 in 10u64..200,
            q2 in 1u32..12,
            w2 in 200u64..2000,
            steps in proptest::collection::vec(0u64..60, 1..200),
        ) {
            let rules = vec![
                RateLimit::new(q1, Duration::from_millis(w1)).unwrap(),
                RateLimit::new(q2, Duration::from_millis(w2)).unwrap(),
            ];
            let mut ledger = Ledger::new(rules.clone());
            let start = Instant::now();
            let mut now = start;
            let mut admitted: Vec<Instant> = Vec::new();

            for step in steps {
                now += Duration::from_millis(step);
                if ledger.try_acquire(now).is_ok() {
                    admitted.push(now);
                }

                for rule in &rules {
                    let in_window = admitted
                        .iter()
                        .filter(|ts| now.saturating_duration_since(**ts) < rule.window())
                        .count() as u32;
                    prop_assert!(in_window <= rule.quota());
                }
            }
        }

        #[test]
        fn test_denied_wait_is_sufficient(
            quota in 1u32..6,
            window_ms in 10u64..500,
            steps in proptest::collection::vec(0u64..40, 1..100),
        ) {
            let rule = RateLimit::new(quota, Duration::from_millis(window_ms)).unwrap();
            let mut ledger = Ledger::new(vec![rule]);
            let mut now = Instant::now();

            for step in steps {
                now += Duration::from_millis(step);
                if let Err(wait) = ledger.try_acquire(now) {
                    prop_assert!(wait > Duration::ZERO);
                    prop_assert!(ledger.try_acquire(now + wait).is_ok());
                    now += wait;
                }
            }
        }
    }
}
