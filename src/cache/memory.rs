//! In-memory cache store.
//!
//! Entries carry their own expiry and are evicted lazily when a lookup finds
//! them stale. Contents are lost when the process exits.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use api_gatekeeper::cache::{CacheKey, CacheStore, MemoryStore, SystemClock, Ttl};
//!
//! let store = MemoryStore::new(Arc::new(SystemClock));
//! let key = CacheKey::derive("/lol/status/v4/platform-data", &[], Some("euw1"));
//!
//! store.put(&key, b"{}", Ttl::seconds(60)).unwrap();
//! assert!(store.get(&key).unwrap().is_some());
//!
//! store.clear().unwrap();
//! assert!(store.get(&key).unwrap().is_none());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::cache::{CacheBackend, CacheEntry, CacheKey, CacheStats, CacheStore, Clock, Ttl};
use crate::error::CacheError;

/// A cache store held in a process-local map.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Create an empty store with a specific initial capacity.
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            clock,
        }
    }

    /// Remove all expired entries.
    ///
    /// Lookups already evict what they touch; this sweeps the rest.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        match entries.get(key.as_str()) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
            Some(_) => {}
        }
        entries.remove(key.as_str());
        debug!(key = %key, "evicted expired entry");
        Ok(None)
    }

    fn put(&self, key: &CacheKey, payload: &[u8], ttl: Ttl) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let entry = CacheEntry::new(key, payload.to_vec(), self.clock.now_millis(), ttl);
        self.lock().insert(key.as_str().to_string(), entry);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.lock().clear();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            entry_count: self.lock().len() as u64,
            size_bytes: None,
        })
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Memory
    }
}
