//! Batch metadata and submission-attempt records.
//!
//! This is the node-local bookkeeping behind RPC verification: which batch a
//! RUID landed in, what root and digest the batch carried, and how far the
//! calendar submission got. It is deliberately outside consensus state — two
//! nodes may hold different attempt histories while agreeing on every
//! snapshot.

use std::sync::Arc;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};
use crate::kv::KvStore;

/// Key prefixes within the shared key-value store.
mod prefix {
    pub const BATCH: &[u8] = b"ots-batch-";
    pub const ATTEMPT: &[u8] = b"ots-attempt-";
    pub const RUID_INDEX: &[u8] = b"ots-ruid-";
    pub const DIGEST_INDEX: &[u8] = b"ots-digest-";
}

/// Lifecycle stage of a locally tracked submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Batch created, calendar submission not yet made.
    Pending,
    /// Submitted to the calendar, Bitcoin confirmation outstanding.
    Submitted,
    /// Attestation confirmed in a Bitcoin block.
    Confirmed,
    /// Anchor transaction landed on-chain.
    Anchored,
    /// Submission failed and was abandoned.
    Failed,
}

/// Metadata for one batch of claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    /// Locally assigned batch identifier.
    pub batch_id: String,
    /// First block of the batch range.
    pub start_block: u64,
    /// Last block of the batch range.
    pub end_block: u64,
    /// Merkle root over the batch RUIDs.
    pub root_hash: B256,
    /// Calendar digest, `sha256(root)`.
    pub ots_digest: B256,
    /// RUIDs contained in the batch.
    pub event_ruids: Vec<B256>,
    /// Unix timestamp of batch creation.
    pub created_at: i64,
}

impl BatchRecord {
    /// Number of RUIDs in the batch.
    pub fn ruid_count(&self) -> usize {
        self.event_ruids.len()
    }
}

/// Progress of the calendar submission for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Batch this attempt belongs to.
    pub batch_id: String,
    /// Current stage.
    pub status: AttemptStatus,
    /// Number of calendar submissions made.
    pub attempt_count: u32,
    /// Unix timestamp of the last submission.
    pub last_attempt_at: i64,
    /// Bitcoin block height, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_block_height: Option<u64>,
    /// Bitcoin transaction id, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_tx_id: Option<String>,
    /// Bitcoin timestamp, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_timestamp: Option<u64>,
}

impl AttemptRecord {
    /// A fresh pending attempt for the given batch.
    pub fn pending(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: AttemptStatus::Pending,
            attempt_count: 0,
            last_attempt_at: chrono::Utc::now().timestamp(),
            btc_block_height: None,
            btc_tx_id: None,
            btc_timestamp: None,
        }
    }
}

/// Typed store for batch and attempt records over any [`KvStore`].
///
/// Saving a batch also writes a RUID index entry per contained RUID and a
/// digest index entry, so verification can go from either handle to the
/// batch in one lookup.
#[derive(Clone)]
pub struct BatchRecordStore {
    kv: Arc<dyn KvStore>,
}

impl BatchRecordStore {
    /// Create a store over the given key-value backend.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(suffix);
        key
    }

    /// Save a batch record and its RUID/digest indexes.
    pub fn save_batch(&self, record: &BatchRecord) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.kv
            .put(&Self::key(prefix::BATCH, record.batch_id.as_bytes()), &data)?;

        for ruid in &record.event_ruids {
            self.kv.put(
                &Self::key(prefix::RUID_INDEX, ruid.as_slice()),
                record.batch_id.as_bytes(),
            )?;
        }
        self.kv.put(
            &Self::key(prefix::DIGEST_INDEX, record.ots_digest.as_slice()),
            record.batch_id.as_bytes(),
        )?;
        Ok(())
    }

    /// Load a batch record by id.
    pub fn batch(&self, batch_id: &str) -> Result<BatchRecord> {
        let data = self
            .kv
            .get(&Self::key(prefix::BATCH, batch_id.as_bytes()))?
            .ok_or_else(|| StorageError::NotFound(format!("batch {batch_id}")))?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::Corrupt(format!("batch {batch_id}: {e}")))
    }

    /// Load the batch containing the given RUID, if any.
    pub fn batch_by_ruid(&self, ruid: &B256) -> Result<Option<BatchRecord>> {
        match self.kv.get(&Self::key(prefix::RUID_INDEX, ruid.as_slice()))? {
            Some(id_bytes) => {
                let batch_id = String::from_utf8(id_bytes)
                    .map_err(|e| StorageError::Corrupt(format!("ruid index: {e}")))?;
                Ok(Some(self.batch(&batch_id)?))
            }
            None => Ok(None),
        }
    }

    /// Load the batch with the given calendar digest, if any.
    pub fn batch_by_digest(&self, digest: &B256) -> Result<Option<BatchRecord>> {
        match self
            .kv
            .get(&Self::key(prefix::DIGEST_INDEX, digest.as_slice()))?
        {
            Some(id_bytes) => {
                let batch_id = String::from_utf8(id_bytes)
                    .map_err(|e| StorageError::Corrupt(format!("digest index: {e}")))?;
                Ok(Some(self.batch(&batch_id)?))
            }
            None => Ok(None),
        }
    }

    /// Save an attempt record.
    pub fn save_attempt(&self, record: &AttemptRecord) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.kv
            .put(&Self::key(prefix::ATTEMPT, record.batch_id.as_bytes()), &data)
    }

    /// Load the attempt record for a batch, if any.
    pub fn attempt(&self, batch_id: &str) -> Result<Option<AttemptRecord>> {
        match self
            .kv
            .get(&Self::key(prefix::ATTEMPT, batch_id.as_bytes()))?
        {
            Some(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StorageError::Corrupt(format!("attempt {batch_id}: {e}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn record() -> BatchRecord {
        BatchRecord {
            batch_id: "20240101-000001".to_string(),
            start_block: 100,
            end_block: 200,
            root_hash: B256::repeat_byte(0x12),
            ots_digest: B256::repeat_byte(0x34),
            event_ruids: vec![B256::repeat_byte(0x11), B256::repeat_byte(0x22)],
            created_at: 1_700_000_000,
        }
    }

    fn store() -> BatchRecordStore {
        BatchRecordStore::new(Arc::new(MemoryKvStore::new()))
    }

    #[test]
    fn batch_roundtrip_and_indexes() {
        let store = store();
        let rec = record();
        store.save_batch(&rec).unwrap();

        assert_eq!(store.batch(&rec.batch_id).unwrap(), rec);
        assert_eq!(
            store.batch_by_ruid(&B256::repeat_byte(0x11)).unwrap(),
            Some(rec.clone())
        );
        assert_eq!(
            store.batch_by_ruid(&B256::repeat_byte(0x22)).unwrap(),
            Some(rec.clone())
        );
        assert_eq!(
            store.batch_by_digest(&B256::repeat_byte(0x34)).unwrap(),
            Some(rec)
        );
    }

    #[test]
    fn missing_lookups() {
        let store = store();
        assert!(store.batch("nope").is_err());
        assert_eq!(store.batch_by_ruid(&B256::repeat_byte(0x99)).unwrap(), None);
        assert_eq!(
            store.batch_by_digest(&B256::repeat_byte(0x99)).unwrap(),
            None
        );
        assert_eq!(store.attempt("nope").unwrap(), None);
    }

    #[test]
    fn attempt_progression() {
        let store = store();
        let rec = record();
        store.save_batch(&rec).unwrap();

        let mut attempt = AttemptRecord::pending(&rec.batch_id);
        store.save_attempt(&attempt).unwrap();
        assert_eq!(
            store.attempt(&rec.batch_id).unwrap().unwrap().status,
            AttemptStatus::Pending
        );

        attempt.status = AttemptStatus::Confirmed;
        attempt.attempt_count = 1;
        attempt.btc_block_height = Some(800_000);
        attempt.btc_tx_id = Some("dead".to_string());
        attempt.btc_timestamp = Some(1_700_000_000);
        store.save_attempt(&attempt).unwrap();

        let loaded = store.attempt(&rec.batch_id).unwrap().unwrap();
        assert_eq!(loaded.status, AttemptStatus::Confirmed);
        assert_eq!(loaded.btc_block_height, Some(800_000));
    }
}
