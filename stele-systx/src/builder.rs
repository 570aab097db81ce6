//! Candidate system-transaction construction.
//!
//! The builder is used by the block producer only. Everything it emits is
//! re-validated by every node through the validator and the consensus
//! manager, so a buggy producer can waste its own slot but cannot corrupt
//! consensus state.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stele_core::Transaction;

use crate::codec::{btc_txid_to_hash, AnchorCalldata, OtsConfirmedCall, OtsSubmittedCall};
use crate::errors::{Result, SystxError};

/// Batch data assembled by the producer ahead of an `anchor` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBatch {
    /// Merkle root recorded at trigger time.
    pub root_hash: B256,
    /// First block of the batch range.
    pub start_block: u64,
    /// Last block of the batch range.
    pub end_block: u64,
    /// RUIDs collected from the batch range, in chain order.
    pub event_ruids: Vec<B256>,
    /// Bitcoin block height from the confirmation.
    pub btc_block_height: u64,
    /// Bitcoin transaction id from the confirmation, hex encoded.
    pub btc_tx_id: String,
    /// Bitcoin timestamp from the confirmation.
    pub btc_timestamp: u64,
    /// Set once the root has been re-verified against the RUIDs.
    pub validated: bool,
}

/// Constructs system transactions addressed to the registry contract.
#[derive(Debug, Clone)]
pub struct Builder {
    contract_address: Address,
}

impl Builder {
    /// Create a builder targeting the given registry contract.
    pub fn new(contract_address: Address) -> Self {
        Self { contract_address }
    }

    /// The registry contract this builder targets.
    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Build an `otsSubmitted` system transaction.
    pub fn build_ots_submitted_tx(
        &self,
        call: &OtsSubmittedCall,
        nonce: u64,
        gas_limit: u64,
    ) -> Transaction {
        let tx = Transaction::system(nonce, self.contract_address, gas_limit, call.encode());
        debug!(
            root_hash = %call.root_hash,
            ots_digest = %call.ots_digest,
            "built otsSubmitted transaction"
        );
        tx
    }

    /// Build an `otsConfirmed` system transaction.
    pub fn build_ots_confirmed_tx(
        &self,
        call: &OtsConfirmedCall,
        nonce: u64,
        gas_limit: u64,
    ) -> Transaction {
        let tx = Transaction::system(nonce, self.contract_address, gas_limit, call.encode());
        debug!(
            root_hash = %call.root_hash,
            btc_block_height = call.btc_block_height,
            "built otsConfirmed transaction"
        );
        tx
    }

    /// Build an `anchor` system transaction from a candidate batch.
    ///
    /// Empty batches are allowed: the root, txid and timestamp may all be
    /// zero. Fails only when the BTC txid cannot be parsed.
    pub fn build_anchor_tx(
        &self,
        candidate: &CandidateBatch,
        nonce: u64,
        gas_limit: u64,
    ) -> Result<Transaction> {
        let call = AnchorCalldata {
            start_block: candidate.start_block,
            end_block: candidate.end_block,
            batch_root: candidate.root_hash,
            btc_tx_hash: btc_txid_to_hash(&candidate.btc_tx_id)?,
            btc_timestamp: candidate.btc_timestamp,
        };

        let tx = Transaction::system(nonce, self.contract_address, gas_limit, call.encode());
        debug!(
            start_block = candidate.start_block,
            end_block = candidate.end_block,
            root_hash = %candidate.root_hash,
            ruids = candidate.event_ruids.len(),
            gas_limit,
            "built anchor transaction"
        );
        Ok(tx)
    }

    /// Double-check a candidate against an independently recomputed root.
    ///
    /// Marks the candidate validated on success; fails with `RootMismatch`
    /// when the declared root disagrees with the recomputation.
    pub fn validate_candidate(
        &self,
        candidate: &mut CandidateBatch,
        computed_root: B256,
    ) -> Result<()> {
        if candidate.end_block < candidate.start_block {
            return Err(SystxError::InvalidCandidate(format!(
                "inverted range [{}, {}]",
                candidate.start_block, candidate.end_block
            )));
        }
        if candidate.root_hash != computed_root {
            tracing::error!(
                candidate_root = %candidate.root_hash,
                computed_root = %computed_root,
                "root mismatch during candidate validation"
            );
            return Err(SystxError::RootMismatch);
        }
        candidate.validated = true;
        Ok(())
    }
}
