//! Rate limiting for upstream API calls.
//!
//! Upstream APIs typically enforce several overlapping quotas at once, such as
//! "20 requests per second" together with "100 requests per two minutes".
//! A [`RateLimiter`] holds an ordered set of [`RateLimit`] rules, each backed
//! by its own sliding window, and admits an operation only when every rule
//! has room for it.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use api_gatekeeper::rate_limit::{RateLimit, RateLimiter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), api_gatekeeper::GateError> {
//! let limiter = RateLimiter::new(vec![
//!     RateLimit::per_second(20)?,
//!     RateLimit::per_minutes(100, 2)?,
//! ])?;
//!
//! // Suspends until both windows have room, then records the admission.
//! limiter.acquire().await;
//!
//! let status = limiter.status().await;
//! assert_eq!(status[0].used, 1);
//! assert_eq!(status[1].remaining, 99);
//! # Ok(())
//! # }
//! ```

mod limiter;
mod window;

pub use limiter::{RateLimiter, RuleStatus};
pub use window::SlidingWindow;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// A single quota rule: no more than `quota` operations in any rolling window.
///
/// Deserializes from `{"quota": 20, "window_seconds": 1}` and rejects a zero
/// quota or a non-positive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "RateLimitSpec", try_from = "RateLimitSpec")]
pub struct RateLimit {
    quota: u32,
    window: Duration,
}

impl RateLimit {
    /// Create a rule admitting `quota` operations per `window`.
    pub fn new(quota: u32, window: Duration) -> Result<Self, GateError> {
        if quota == 0 {
            return Err(GateError::config("rate limit quota must be at least 1"));
        }
        if window.is_zero() {
            return Err(GateError::config("rate limit window must be positive"));
        }
        Ok(Self { quota, window })
    }

    /// `quota` operations per second.
    pub fn per_second(quota: u32) -> Result<Self, GateError> {
        Self::new(quota, Duration::from_secs(1))
    }

    /// `quota` operations per `minutes` minutes.
    pub fn per_minutes(quota: u32, minutes: u64) -> Result<Self, GateError> {
        Self::new(quota, Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Maximum operations within one window.
    pub fn quota(&self) -> u32 {
        self.quota
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} per {:?}", self.quota, self.window)
    }
}

/// Wire form of a [`RateLimit`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RateLimitSpec {
    quota: u32,
    window_seconds: f64,
}

impl TryFrom<RateLimitSpec> for RateLimit {
    type Error = GateError;

    fn try_from(spec: RateLimitSpec) -> Result<Self, Self::Error> {
        let window = Duration::try_from_secs_f64(spec.window_seconds).map_err(|_| {
            GateError::config(format!(
                "invalid rate limit window: {} seconds",
                spec.window_seconds
            ))
        })?;
        RateLimit::new(spec.quota, window)
    }
}

impl From<RateLimit> for RateLimitSpec {
    fn from(limit: RateLimit) -> Self {
        Self {
            quota: limit.quota,
            window_seconds: limit.window.as_secs_f64(),
        }
    }
}

/// Rate limit constants for common upstream key tiers.
pub mod limits {
    use std::time::Duration;

    use super::RateLimit;

    /// Requests per second allowed for a development key.
    pub const DEVELOPMENT_PER_SECOND: u32 = 20;
    /// Requests per two minutes allowed for a development key.
    pub const DEVELOPMENT_PER_TWO_MINUTES: u32 = 100;

    /// The rule set of a development API key: 20 per second and 100 per two minutes.
    pub fn development_key() -> Vec<RateLimit> {
        vec![
            RateLimit {
                quota: DEVELOPMENT_PER_SECOND,
                window: Duration::from_secs(1),
            },
            RateLimit {
                quota: DEVELOPMENT_PER_TWO_MINUTES,
                window: Duration::from_secs(120),
            },
        ]
    }
}
