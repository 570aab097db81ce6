//! RUID verification over locally tracked batch records.
//!
//! This is the read side of the RPC surface: given a RUID, report whether it
//! is covered by a Bitcoin-confirmed batch. Verification never raises for
//! "not found" or "still pending" — the outcome is always a structured
//! result, so callers can hand it straight to a JSON transport.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stele_merkle::RuidTree;
use stele_storage::{AttemptStatus, BatchRecordStore};

/// Outcome of a RUID verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    /// Whether the RUID is covered by a Bitcoin-confirmed batch.
    pub verified: bool,
    /// The batch the RUID belongs to, when known.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub batch_id: String,
    /// Bitcoin block height of the batch attestation, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_block_height: Option<u64>,
    /// Bitcoin timestamp of the batch attestation, once confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_timestamp: Option<u64>,
    /// Human-readable explanation of the outcome.
    pub message: String,
}

impl VerifyResult {
    fn negative(message: impl Into<String>) -> Self {
        Self {
            verified: false,
            batch_id: String::new(),
            btc_block_height: None,
            btc_timestamp: None,
            message: message.into(),
        }
    }

    fn negative_in_batch(batch_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            ..Self::negative(message)
        }
    }
}

/// Verification API over the node-local batch record store.
#[derive(Clone)]
pub struct VerifyApi {
    store: BatchRecordStore,
}

impl VerifyApi {
    /// Create an API over the given record store.
    pub fn new(store: BatchRecordStore) -> Self {
        Self { store }
    }

    /// Verify a RUID given as a hex string (optional `0x` prefix).
    pub fn verify_ruid(&self, ruid_hex: &str) -> VerifyResult {
        let stripped = ruid_hex.strip_prefix("0x").unwrap_or(ruid_hex);
        let bytes = match hex::decode(stripped) {
            Ok(bytes) if bytes.len() == 32 => bytes,
            Ok(bytes) => {
                return VerifyResult::negative(format!(
                    "invalid RUID: expected 32 bytes, got {}",
                    bytes.len()
                ))
            }
            Err(e) => return VerifyResult::negative(format!("invalid RUID: {e}")),
        };
        self.verify(&B256::from_slice(&bytes))
    }

    /// Verify a parsed RUID.
    pub fn verify(&self, ruid: &B256) -> VerifyResult {
        let batch = match self.store.batch_by_ruid(ruid) {
            Ok(Some(batch)) => batch,
            Ok(None) => return VerifyResult::negative("RUID not found in any batch"),
            Err(e) => {
                debug!(ruid = %ruid, error = %e, "batch lookup failed");
                return VerifyResult::negative(format!("storage error: {e}"));
            }
        };

        // Recompute membership: the stored root must be reproducible from the
        // stored RUIDs, and the proof must verify for this RUID.
        let tree = RuidTree::from_ruids(batch.event_ruids.clone());
        if tree.root() != batch.root_hash {
            return VerifyResult::negative_in_batch(
                &batch.batch_id,
                "stored root does not match recomputed root",
            );
        }
        let proven = tree
            .proof(ruid)
            .map(|proof| proof.verify_ruid(ruid))
            .unwrap_or(false);
        if !proven {
            return VerifyResult::negative_in_batch(
                &batch.batch_id,
                "Merkle proof verification failed",
            );
        }

        let attempt = match self.store.attempt(&batch.batch_id) {
            Ok(attempt) => attempt,
            Err(e) => {
                return VerifyResult::negative_in_batch(
                    &batch.batch_id,
                    format!("storage error: {e}"),
                )
            }
        };

        match attempt {
            None => VerifyResult::negative_in_batch(
                &batch.batch_id,
                "batch not yet submitted to calendar",
            ),
            Some(attempt) => match attempt.status {
                AttemptStatus::Pending => VerifyResult::negative_in_batch(
                    &batch.batch_id,
                    "batch not yet submitted to calendar",
                ),
                AttemptStatus::Submitted => VerifyResult::negative_in_batch(
                    &batch.batch_id,
                    "batch awaiting Bitcoin confirmation",
                ),
                AttemptStatus::Failed => VerifyResult::negative_in_batch(
                    &batch.batch_id,
                    "batch submission failed",
                ),
                AttemptStatus::Confirmed | AttemptStatus::Anchored => VerifyResult {
                    verified: true,
                    batch_id: batch.batch_id.clone(),
                    btc_block_height: attempt.btc_block_height,
                    btc_timestamp: attempt.btc_timestamp,
                    message: format!(
                        "RUID verified in batch {} at Bitcoin height {}",
                        batch.batch_id,
                        attempt.btc_block_height.unwrap_or(0)
                    ),
                },
            },
        }
    }
}
