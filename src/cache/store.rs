//! The storage contract shared by every cache backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{
    CacheBackend, CacheConfig, CacheKey, Clock, MemoryStore, PersistentStore, Ttl,
};
use crate::error::CacheError;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub key: String,
    /// Opaque response body.
    pub payload: Vec<u8>,
    /// Unix milliseconds at which the entry was written.
    pub stored_at_ms: u64,
    /// Unix milliseconds at which the entry stops being served, if ever.
    pub expires_at_ms: Option<u64>,
}

impl CacheEntry {
    /// Build an entry written at `now_ms` with the given TTL.
    pub fn new(key: &CacheKey, payload: Vec<u8>, now_ms: u64, ttl: Ttl) -> Self {
        let expires_at_ms = ttl
            .duration()
            .map(|d| now_ms.saturating_add(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)));
        Self {
            key: key.as_str().to_string(),
            payload,
            stored_at_ms: now_ms,
            expires_at_ms,
        }
    }

    /// Whether the entry is stale at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expires| now_ms >= expires)
    }
}

/// Size of a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of stored entries, expired ones not yet evicted included.
    pub entry_count: u64,
    /// Bytes on disk, for persistent backends.
    pub size_bytes: Option<u64>,
}

/// Key/value storage with per-entry expiry.
///
/// Implementations must tolerate concurrent calls on any keys; the last
/// writer of a key wins.
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Fetch a live entry. Expired entries are evicted and reported as a miss.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `payload` under `key`, replacing any previous entry.
    ///
    /// A zero TTL stores nothing.
    fn put(&self, key: &CacheKey, payload: &[u8], ttl: Ttl) -> Result<(), CacheError>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), CacheError>;

    /// Entry count and, where meaningful, storage size.
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Which backend this store is.
    fn backend(&self) -> CacheBackend;
}

/// Open the store selected by `config`.
pub fn open_store(
    config: &CacheConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new(clock))),
        CacheBackend::Persistent => {
            Ok(Arc::new(PersistentStore::open(config.storage_path(), clock)?))
        }
    }
}
