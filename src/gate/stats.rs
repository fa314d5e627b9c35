//! Call counters for a request gate.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Counts calls by provenance. Shared by clones of a gate.
#[derive(Debug, Default)]
pub struct CallStats {
    total_calls: AtomicU64,
    cache_hits: AtomicU64,
    fresh_calls: AtomicU64,
}

/// A point-in-time copy of [`CallStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallStatsSnapshot {
    /// Calls made through the gate.
    pub total_calls: u64,
    /// Calls served from cache.
    pub cache_hits: u64,
    /// Calls forwarded to the transport.
    pub fresh_calls: u64,
}

impl CallStatsSnapshot {
    /// Percentage of calls served from cache, if any calls were made.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.total_calls > 0).then(|| self.cache_hits as f64 / self.total_calls as f64 * 100.0)
    }
}

impl CallStats {
    /// Count a call served from cache.
    pub fn record_hit(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a call forwarded upstream.
    pub fn record_fresh(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.fresh_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> CallStatsSnapshot {
        CallStatsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fresh_calls: self.fresh_calls.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.fresh_calls.store(0, Ordering::Relaxed);
    }

    /// Log a one-line summary at info level.
    pub fn log_summary(&self) {
        let stats = self.snapshot();
        match stats.hit_rate() {
            Some(rate) => info!(
                total = stats.total_calls,
                fresh = stats.fresh_calls,
                cached = stats.cache_hits,
                "call stats: {:.1}% cache hit rate",
                rate
            ),
            None => info!("call stats: no calls made yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_hit_rate() {
        let stats = CallStats::default();
        assert_eq!(stats.snapshot().hit_rate(), None);

        stats.record_fresh();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_calls, 4);
        assert_eq!(snapshot.fresh_calls, 1);
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.hit_rate(), Some(75.0));

        stats.reset();
        assert_eq!(stats.snapshot(), CallStatsSnapshot::default());
    }
}
