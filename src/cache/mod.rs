//! Response caching.
//!
//! A [`CacheConfig`] decides, per endpoint path, whether responses are cached
//! and for how long. Stored responses live in a [`CacheStore`]: either a
//! [`MemoryStore`] or a [`PersistentStore`] backed by a single redb file.
//! Both behave identically apart from surviving process restarts.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use api_gatekeeper::cache::{open_store, CacheConfig, CacheKey, SystemClock};
//!
//! let config = CacheConfig::smart_memory();
//! let store = open_store(&config, Arc::new(SystemClock)).unwrap();
//!
//! let path = "/lol/match/v5/matches/EUW1_123";
//! let policy = config.resolve(path);
//! let key = CacheKey::derive(path, &[], Some("europe"));
//!
//! if policy.is_cacheable() {
//!     store.put(&key, b"{\"metadata\":{}}", policy.ttl).unwrap();
//! }
//! assert_eq!(store.stats().unwrap().entry_count, 1);
//! ```

mod clock;
mod config;
mod key;
mod memory;
mod persistent;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheBackend, CacheConfig, DEFAULT_CACHE_NAME, DEFAULT_TTL, EndpointOverride,
    EndpointOverrides, ResolvedPolicy, Ttl, ttl_seconds,
};
pub use key::{CacheKey, canonical_form};
pub use memory::MemoryStore;
pub use persistent::PersistentStore;
pub use store::{CacheEntry, CacheStats, CacheStore, open_store};
