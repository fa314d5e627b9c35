//! Persistent cache store backed by a single redb file.
//!
//! Each entry is a bincode-encoded [`CacheEntry`] keyed by its cache key.
//! Clearing drops and recreates the table and compacts the file in place, so
//! the same path keeps working without reopening.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::debug;

use crate::cache::{CacheBackend, CacheEntry, CacheKey, CacheStats, CacheStore, Clock, Ttl};
use crate::error::CacheError;

/// Table of stored responses.
/// Key: cache key (hex), Value: serialized CacheEntry (bincode)
const RESPONSES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("responses");

/// Conversion of the various redb error types into [`CacheError`].
trait DbResultExt<T> {
    fn db(self) -> Result<T, CacheError>;
}

impl<T, E: Into<redb::Error>> DbResultExt<T> for Result<T, E> {
    fn db(self) -> Result<T, CacheError> {
        self.map_err(|e| CacheError::Database(e.into()))
    }
}

/// A cache store persisted to disk.
pub struct PersistentStore {
    // Write-locked only for compaction, which needs exclusive access.
    db: RwLock<Database>,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl PersistentStore {
    /// Create or open the store at `path`.
    ///
    /// Creates the parent directory and the database file if they don't exist.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path).db()?;

        let write_txn = db.begin_write().db()?;
        {
            write_txn.open_table(RESPONSES_TABLE).db()?;
        }
        write_txn.commit().db()?;

        debug!(path = %path.display(), "persistent cache opened");
        Ok(Self {
            db: RwLock::new(db),
            path,
            clock,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove_if_expired(&self, db: &Database, key: &CacheKey, now: u64) -> Result<(), CacheError> {
        let write_txn = db.begin_write().db()?;
        {
            let mut table = write_txn.open_table(RESPONSES_TABLE).db()?;
            // Another writer may have refreshed the entry since it was read.
            let still_expired = match table.get(key.as_str()).db()? {
                Some(value) => bincode::deserialize::<CacheEntry>(value.value())
                    .map(|entry| entry.is_expired(now))
                    .unwrap_or(true),
                None => false,
            };
            if still_expired {
                table.remove(key.as_str()).db()?;
            }
        }
        write_txn.commit().db()?;
        Ok(())
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("path", &self.path)
            .field("clock", &self.clock)
            .finish()
    }
}

impl CacheStore for PersistentStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now_millis();
        let db = self.db.read().unwrap_or_else(PoisonError::into_inner);

        let entry = {
            let read_txn = db.begin_read().db()?;
            let table = read_txn.open_table(RESPONSES_TABLE).db()?;
            match table.get(key.as_str()).db()? {
                Some(value) => Some(bincode::deserialize::<CacheEntry>(value.value())?),
                None => None,
            }
        };

        match entry {
            Some(entry) if entry.is_expired(now) => {
                self.remove_if_expired(&db, key, now)?;
                debug!(key = %key, "evicted expired entry");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn put(&self, key: &CacheKey, payload: &[u8], ttl: Ttl) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let entry = CacheEntry::new(key, payload.to_vec(), self.clock.now_millis(), ttl);
        let serialized = bincode::serialize(&entry)?;

        let db = self.db.read().unwrap_or_else(PoisonError::into_inner);
        let write_txn = db.begin_write().db()?;
        {
            let mut table = write_txn.open_table(RESPONSES_TABLE).db()?;
            table.insert(key.as_str(), serialized.as_slice()).db()?;
        }
        write_txn.commit().db()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut db = self.db.write().unwrap_or_else(PoisonError::into_inner);

        let write_txn = db.begin_write().db()?;
        write_txn.delete_table(RESPONSES_TABLE).db()?;
        {
            write_txn.open_table(RESPONSES_TABLE).db()?;
        }
        write_txn.commit().db()?;

        db.compact().db()?;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entry_count = {
            let db = self.db.read().unwrap_or_else(PoisonError::into_inner);
            let read_txn = db.begin_read().db()?;
            let table = read_txn.open_table(RESPONSES_TABLE).db()?;
            table.len().db()?
        };
        let size_bytes = std::fs::metadata(&self.path)?.len();

        Ok(CacheStats {
            entry_count,
            size_bytes: Some(size_bytes),
        })
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Persistent
    }
}
