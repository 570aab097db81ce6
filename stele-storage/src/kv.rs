//! Flat key-value store abstraction.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::errors::Result;

/// A flat byte-keyed store.
///
/// Callers namespace their keys with prefixes; the store itself imposes no
/// structure. Implementations must be safe to share across threads.
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any existing value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Whether a value exists under `key`.
    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory store for tests and light-weight tooling.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    map: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.map.read().contains_key(key))
    }
}
