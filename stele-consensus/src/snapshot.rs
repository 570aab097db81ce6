//! Snapshot cache and persistence.
//!
//! Snapshots summarize OTS state at a chain position, keyed by block hash so
//! reorged blocks simply resolve to different snapshots. The manager keeps a
//! bounded in-memory cache and persists every 1024th block to the durable
//! store, which bounds rebuild work after a restart or deep reorg.

use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy_primitives::B256;
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stele_storage::KvStore;

use crate::errors::{ConsensusError, Result};
use crate::state::OtsState;

/// Number of snapshots kept in memory.
pub const SNAPSHOT_CACHE_SIZE: usize = 128;

/// Block interval for persisting snapshots to the durable store.
pub const SNAPSHOT_PERSIST_INTERVAL: u64 = 1024;

/// Key prefix for persisted snapshots.
const SNAPSHOT_PREFIX: &[u8] = b"ots-snapshot-";

/// An OTS state snapshot at a specific block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// OTS state at this block.
    pub state: OtsState,
}

impl Snapshot {
    /// Create a new snapshot.
    pub fn new(number: u64, hash: B256, state: OtsState) -> Self {
        Self {
            number,
            hash,
            state,
        }
    }

    /// Canonical encoding, shared with the durable store.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot from its canonical encoding.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

fn snapshot_key(hash: &B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(SNAPSHOT_PREFIX.len() + 32);
    key.extend_from_slice(SNAPSHOT_PREFIX);
    key.extend_from_slice(hash.as_slice());
    key
}

struct Inner {
    cache: LruCache<B256, Snapshot>,
    store: Arc<dyn KvStore>,
}

impl Inner {
    fn load(&self, hash: &B256) -> Result<Option<Snapshot>> {
        match self.store.get(&snapshot_key(hash))? {
            Some(data) => Ok(Some(Snapshot::decode(&data)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snap: &Snapshot) -> Result<()> {
        self.store.put(&snapshot_key(&snap.hash), &snap.encode()?)?;
        Ok(())
    }
}

/// Manages OTS snapshots with caching and interval persistence.
///
/// One reader/writer lock covers the cache and the store handle; reads are
/// shared, writes exclusive. Every returned snapshot is a copy, so callers
/// may mutate freely.
pub struct SnapshotManager {
    inner: RwLock<Inner>,
    enabled: bool,
}

impl SnapshotManager {
    /// Create a manager over the given durable store.
    ///
    /// `enabled` seeds the genesis state when no snapshot history exists.
    pub fn new(store: Arc<dyn KvStore>, enabled: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                cache: LruCache::new(
                    NonZeroUsize::new(SNAPSHOT_CACHE_SIZE).expect("cache size is non-zero"),
                ),
                store,
            }),
            enabled,
        }
    }

    /// Retrieve the snapshot for the given block hash.
    ///
    /// Cache hits are served under the read lock; misses fall through to the
    /// durable store and are promoted into the cache.
    pub fn get_snapshot(&self, hash: B256) -> Result<Snapshot> {
        let loaded = {
            let inner = self.inner.read();
            if let Some(snap) = inner.cache.peek(&hash) {
                return Ok(snap.clone());
            }
            inner.load(&hash)?
        };

        match loaded {
            Some(snap) => {
                self.inner.write().cache.put(hash, snap.clone());
                Ok(snap)
            }
            None => Err(ConsensusError::SnapshotNotFound),
        }
    }

    /// Store a snapshot in the cache, persisting it when its number lies on
    /// the persistence interval.
    pub fn store_snapshot(&self, snap: &Snapshot) -> Result<()> {
        let mut inner = self.inner.write();
        inner.cache.put(snap.hash, snap.clone());

        if snap.number % SNAPSHOT_PERSIST_INTERVAL == 0 {
            inner.save(snap)?;
            debug!(number = snap.number, hash = %snap.hash, "persisted OTS snapshot");
        }
        Ok(())
    }

    /// Store a snapshot and persist it unconditionally.
    pub fn force_store(&self, snap: &Snapshot) -> Result<()> {
        let mut inner = self.inner.write();
        inner.cache.put(snap.hash, snap.clone());
        inner.save(snap)
    }

    /// Whether a snapshot exists in cache or durable storage.
    pub fn has_snapshot(&self, hash: B256) -> bool {
        let inner = self.inner.read();
        if inner.cache.contains(&hash) {
            return true;
        }
        inner.store.has(&snapshot_key(&hash)).unwrap_or(false)
    }

    /// Remove a snapshot from cache and durable storage.
    pub fn delete_snapshot(&self, hash: B256) -> Result<()> {
        let mut inner = self.inner.write();
        inner.cache.pop(&hash);
        inner.store.delete(&snapshot_key(&hash))?;
        Ok(())
    }

    /// Drop every cached snapshot. Durable storage is untouched.
    pub fn clear(&self) {
        self.inner.write().cache.clear();
    }

    /// Current cache occupancy and capacity.
    pub fn cache_stats(&self) -> (usize, usize) {
        (self.inner.read().cache.len(), SNAPSHOT_CACHE_SIZE)
    }

    /// The genesis snapshot for this chain.
    pub fn genesis_snapshot(&self, genesis_hash: B256) -> Snapshot {
        Snapshot::new(0, genesis_hash, OtsState::new(self.enabled))
    }

    /// Find the nearest persisted snapshot at or below `target`.
    ///
    /// Walks backward from `target` rounded down to the persistence interval,
    /// resolving each candidate number to its block hash via `hash_of`.
    /// Returns the genesis snapshot when nothing is recoverable.
    pub fn find_nearest_snapshot(
        &self,
        target: u64,
        hash_of: impl Fn(u64) -> Option<B256>,
    ) -> Snapshot {
        {
            let inner = self.inner.read();
            let mut number = (target / SNAPSHOT_PERSIST_INTERVAL) * SNAPSHOT_PERSIST_INTERVAL;
            while number > 0 {
                if let Some(hash) = hash_of(number) {
                    if let Some(snap) = inner.cache.peek(&hash) {
                        return snap.clone();
                    }
                    if let Ok(Some(snap)) = inner.load(&hash) {
                        return snap;
                    }
                }
                number -= SNAPSHOT_PERSIST_INTERVAL;
            }
        }

        self.genesis_snapshot(hash_of(0).unwrap_or(B256::ZERO))
    }
}
