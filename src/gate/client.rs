//! The caching, rate-limited request gate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, CacheConfig, CacheStore, Clock, SystemClock, open_store};
use crate::error::GateError;
use crate::gate::{CallStats, CallStatsSnapshot, GateResponse, RequestDescriptor};
use crate::rate_limit::{RateLimit, RateLimiter, RuleStatus};
use crate::transport::Transport;

/// Summary of the cache behind a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    /// Whether caching is switched on.
    pub enabled: bool,
    /// Configured backend.
    pub backend: CacheBackend,
    /// Stored entries.
    pub entry_count: u64,
    /// Bytes on disk, for persistent backends.
    pub size_bytes: Option<u64>,
}

/// Serves requests from cache when possible and otherwise waits for rate
/// limit quota before calling the transport.
///
/// A cache hit never touches the rate limiter. Every fresh fetch records
/// exactly one limiter admission and, when the path is cacheable, one cache
/// write.
///
/// # Example
///
/// ```rust,no_run
/// use api_gatekeeper::cache::CacheConfig;
/// use api_gatekeeper::gate::{RequestDescriptor, RequestGate};
/// use api_gatekeeper::transport::HttpTransport;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = HttpTransport::builder()
///         .base_url("https://{region}.api.riotgames.com")
///         .default_header("X-Riot-Token", "RGAPI-...")
///         .build()?;
///
///     let gate = RequestGate::builder(transport)
///         .cache_config(CacheConfig::smart())
///         .build()?;
///
///     let request = RequestDescriptor::get("/lol/match/v5/matches/EUW1_1").region("europe");
///     let response = gate.execute(&request).await?;
///     println!("from cache: {}", response.from_cache());
///     Ok(())
/// }
/// ```
pub struct RequestGate<T> {
    transport: T,
    config: Arc<CacheConfig>,
    /// `None` when caching is switched off entirely
    store: Option<Arc<dyn CacheStore>>,
    limiter: RateLimiter,
    stats: Arc<CallStats>,
}

impl<T: Transport> RequestGate<T> {
    /// Create a new gate builder around `transport`.
    pub fn builder(transport: T) -> RequestGateBuilder<T> {
        RequestGateBuilder::new(transport)
    }

    /// Serve `request` from cache or fetch it fresh.
    ///
    /// Transport errors are returned unchanged; the rate limit admission for
    /// the attempt has already been recorded by then.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<GateResponse, GateError> {
        let endpoint = request.endpoint();
        let policy = self.config.resolve(endpoint);
        let store = self
            .store
            .as_ref()
            .filter(|_| policy.is_cacheable() && request.is_cacheable_method());
        let key = request.cache_key();

        if let Some(store) = store {
            match store.get(&key) {
                Ok(Some(entry)) => {
                    self.stats.record_hit();
                    debug!(endpoint, key = %key, "served from cache");
                    return Ok(GateResponse::cached(entry.payload));
                }
                Ok(None) => debug!(endpoint, key = %key, "cache miss"),
                Err(e) => warn!(endpoint, error = %e, "cache read failed, fetching fresh"),
            }
        }

        self.limiter.acquire().await;
        self.stats.record_fresh();
        debug!(endpoint, method = %request.method(), "fetching fresh response");
        let payload = self.transport.fetch(request).await?;

        if let Some(store) = store {
            match store.put(&key, &payload, policy.ttl) {
                Ok(()) => debug!(endpoint, key = %key, ttl = ?policy.ttl, "response cached"),
                Err(e) => warn!(endpoint, error = %e, "cache write failed, response not cached"),
            }
        }

        Ok(GateResponse::fresh(payload))
    }
}

impl<T> RequestGate<T> {
    /// Enabled flag, backend and size of the cache.
    pub fn cache_info(&self) -> Result<CacheInfo, GateError> {
        let stats = match &self.store {
            Some(store) => store.stats()?,
            None => Default::default(),
        };
        Ok(CacheInfo {
            enabled: self.config.enabled,
            backend: self.config.backend,
            entry_count: stats.entry_count,
            size_bytes: stats.size_bytes,
        })
    }

    /// Remove every cached response.
    pub fn clear_cache(&self) -> Result<(), GateError> {
        if let Some(store) = &self.store {
            store.clear()?;
            info!(backend = %store.backend(), "cache cleared");
        }
        Ok(())
    }

    /// Current usage of every rate limit rule.
    pub async fn rate_limit_status(&self) -> Vec<RuleStatus> {
        self.limiter.status().await
    }

    /// Forget all recorded rate limit admissions.
    pub async fn reset_rate_limiter(&self) {
        self.limiter.reset().await;
    }

    /// Counts of cached and fresh calls so far.
    pub fn call_stats(&self) -> CallStatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero the call counters.
    pub fn reset_call_stats(&self) {
        self.stats.reset();
    }

    /// Log the call counters and cache hit rate.
    pub fn log_stats_summary(&self) {
        self.stats.log_summary();
    }

    /// The cache configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The rate limiter shared by this gate's clones.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RequestGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

impl<T: Clone> Clone for RequestGate<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Builder for [`RequestGate`].
pub struct RequestGateBuilder<T> {
    transport: T,
    cache_config: CacheConfig,
    rules: Option<Vec<RateLimit>>,
    limiter: Option<RateLimiter>,
    store: Option<Arc<dyn CacheStore>>,
    clock: Arc<dyn Clock>,
}

impl<T: Transport> RequestGateBuilder<T> {
    /// Create a builder with the default cache config and rate limits.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache_config: CacheConfig::default(),
            rules: None,
            limiter: None,
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the cache policy.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Set the rate limit rules, in evaluation order.
    pub fn rate_limits(mut self, rules: Vec<RateLimit>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Share an existing limiter, e.g. between gates on one API key.
    ///
    /// Takes precedence over [`RequestGateBuilder::rate_limits`].
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Use a specific store instead of opening the configured backend.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the clock used for cache expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the gate, opening the cache store if caching is enabled.
    pub fn build(self) -> Result<RequestGate<T>, GateError> {
        let limiter = match (self.limiter, self.rules) {
            (Some(limiter), _) => limiter,
            (None, Some(rules)) => RateLimiter::new(rules)?,
            (None, None) => RateLimiter::default(),
        };

        let store = if !self.cache_config.enabled {
            None
        } else if let Some(store) = self.store {
            Some(store)
        } else {
            Some(open_store(&self.cache_config, self.clock)?)
        };

        if let Some(store) = &store {
            info!(
                backend = %store.backend(),
                cache_name = %self.cache_config.cache_name,
                overrides = self.cache_config.endpoint_overrides.len(),
                "caching enabled"
            );
        }

        Ok(RequestGate {
            transport: self.transport,
            config: Arc::new(self.cache_config),
            store,
            limiter,
            stats: Arc::new(CallStats::default()),
        })
    }
}
