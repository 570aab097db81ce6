//! RocksDB storage implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Options, DB};
use tracing::info;

use crate::errors::{Result, StorageError};
use crate::kv::KvStore;

/// RocksDB-backed key-value store.
pub struct RocksKvStore {
    db: Arc<DB>,
}

impl RocksKvStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening RocksDB at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open with a temporary directory (for testing).
    pub fn open_temp() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| StorageError::Backend(e.to_string()))?;
        let path = dir.path().to_path_buf();
        // Keep the temp dir alive by forgetting it (won't be cleaned up on drop)
        std::mem::forget(dir);
        Self::open(path)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

impl Clone for RocksKvStore {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl KvStore for RocksKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rocks_store_roundtrip() {
        let store = RocksKvStore::open_temp().unwrap();

        assert_eq!(store.get(b"missing").unwrap(), None);

        store.put(b"snapshot", b"payload").unwrap();
        assert_eq!(store.get(b"snapshot").unwrap(), Some(b"payload".to_vec()));
        assert!(store.has(b"snapshot").unwrap());

        store.delete(b"snapshot").unwrap();
        assert!(!store.has(b"snapshot").unwrap());

        store.flush().unwrap();
    }

    #[test]
    fn clones_share_the_database() {
        let store = RocksKvStore::open_temp().unwrap();
        let other = store.clone();

        store.put(b"shared", b"1").unwrap();
        assert_eq!(other.get(b"shared").unwrap(), Some(b"1".to_vec()));
    }
}
