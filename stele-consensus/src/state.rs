//! The batch state machine.
//!
//! OTS state is part of blockchain consensus: it is derived purely from block
//! contents, so every node tracks batch progress independently and
//! identically. The only mutations are the four operations below, each gated
//! on the transition relation:
//!
//! ```text
//! None       -> Triggered
//! Triggered  -> Submitted
//! Submitted  -> Confirmed
//! Confirmed  -> Anchored | None     (None = operator/timeout reset)
//! Anchored   -> None
//! ```
//!
//! `Anchored` is transient: `mark_anchored` clears the batch in the same
//! call, so the status is never observable in a stored snapshot.

use std::fmt;

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

use crate::errors::{ConsensusError, Result};

/// Status of an OTS batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// No active batch.
    #[default]
    None,
    /// Batch triggered, waiting for calendar submission.
    Triggered,
    /// Submitted to the OTS calendar, waiting for Bitcoin confirmation.
    Submitted,
    /// Confirmed on Bitcoin, waiting for the on-chain anchor.
    Confirmed,
    /// Anchored on-chain; transient, cleared within the anchoring transition.
    Anchored,
}

impl BatchStatus {
    /// Whether a transition from `self` to `target` is in the relation.
    pub fn can_transition_to(&self, target: BatchStatus) -> bool {
        use BatchStatus::*;
        match self {
            None => target == Triggered,
            Triggered => target == Submitted,
            Submitted => target == Confirmed,
            Confirmed => target == Anchored || target == None,
            Anchored => target == None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::None => "none",
            BatchStatus::Triggered => "triggered",
            BatchStatus::Submitted => "submitted",
            BatchStatus::Confirmed => "confirmed",
            BatchStatus::Anchored => "anchored",
        };
        write!(f, "{s}")
    }
}

/// State of a single OTS batch.
///
/// Field groups after the trigger fields are populated by the corresponding
/// transition and stay `None` until then; the canonical encoding omits absent
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchState {
    /// First block of the batch range.
    pub start_block: u64,
    /// Last block of the batch range.
    pub end_block: u64,
    /// Merkle root over the range's RUIDs, fixed at trigger time.
    pub root_hash: B256,
    /// Current status.
    pub status: BatchStatus,
    /// Block that triggered the batch.
    pub trigger_block: u64,
    /// Coinbase of the trigger block.
    pub trigger_node: Address,

    /// Calendar digest, set on submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ots_digest: Option<B256>,
    /// Block number of the submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<u64>,
    /// Coinbase of the submission block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Address>,

    /// Bitcoin block height, set on confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_block_height: Option<u64>,
    /// Bitcoin transaction id (hex), set on confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_tx_id: Option<String>,
    /// Bitcoin block timestamp, set on confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_timestamp: Option<u64>,
    /// Block number of the confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<u64>,
    /// Coinbase of the confirmation block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<Address>,

    /// Block number of the anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<u64>,
    /// Coinbase of the anchor block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored_by: Option<Address>,
}

impl BatchState {
    fn triggered(
        start_block: u64,
        end_block: u64,
        trigger_block: u64,
        trigger_node: Address,
        root_hash: B256,
    ) -> Self {
        Self {
            start_block,
            end_block,
            root_hash,
            status: BatchStatus::Triggered,
            trigger_block,
            trigger_node,
            ots_digest: None,
            submitted_at: None,
            submitted_by: None,
            btc_block_height: None,
            btc_tx_id: None,
            btc_timestamp: None,
            confirmed_at: None,
            confirmed_by: None,
            anchored_at: None,
            anchored_by: None,
        }
    }
}

/// The OTS consensus state carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtsState {
    /// Whether OTS is enabled for this chain.
    pub enabled: bool,
    /// End block of the most recently anchored batch, `0` if none.
    pub last_anchored_block: u64,
    /// The batch currently in flight, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<BatchState>,
}

impl OtsState {
    /// A fresh state with no anchored history.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_anchored_block: 0,
            current_batch: None,
        }
    }

    /// Whether a batch is currently in flight.
    pub fn has_active_batch(&self) -> bool {
        self.current_batch
            .as_ref()
            .is_some_and(|b| b.status != BatchStatus::None)
    }

    /// Whether a new batch may be triggered.
    pub fn can_trigger(&self) -> bool {
        self.enabled && !self.has_active_batch()
    }

    /// Start a new batch.
    pub fn trigger(
        &mut self,
        start_block: u64,
        end_block: u64,
        trigger_block: u64,
        trigger_node: Address,
        root_hash: B256,
    ) -> Result<()> {
        if !self.can_trigger() {
            return Err(ConsensusError::AlreadyTriggered);
        }

        self.current_batch = Some(BatchState::triggered(
            start_block,
            end_block,
            trigger_block,
            trigger_node,
            root_hash,
        ));
        Ok(())
    }

    /// Record the calendar submission for the current batch.
    pub fn mark_submitted(
        &mut self,
        digest: B256,
        block_number: u64,
        submitter: Address,
    ) -> Result<()> {
        let batch = match &mut self.current_batch {
            Some(b) if b.status == BatchStatus::Triggered => b,
            _ => return Err(ConsensusError::NotTriggered),
        };
        if !batch.status.can_transition_to(BatchStatus::Submitted) {
            return Err(ConsensusError::InvalidTransition);
        }

        batch.ots_digest = Some(digest);
        batch.submitted_at = Some(block_number);
        batch.submitted_by = Some(submitter);
        batch.status = BatchStatus::Submitted;
        Ok(())
    }

    /// Record the Bitcoin confirmation for the current batch.
    pub fn mark_confirmed(
        &mut self,
        btc_block_height: u64,
        btc_tx_id: impl Into<String>,
        btc_timestamp: u64,
        block_number: u64,
        confirmer: Address,
    ) -> Result<()> {
        let batch = match &mut self.current_batch {
            Some(b) if b.status == BatchStatus::Submitted => b,
            _ => return Err(ConsensusError::NotSubmitted),
        };
        if !batch.status.can_transition_to(BatchStatus::Confirmed) {
            return Err(ConsensusError::InvalidTransition);
        }

        batch.btc_block_height = Some(btc_block_height);
        batch.btc_tx_id = Some(btc_tx_id.into());
        batch.btc_timestamp = Some(btc_timestamp);
        batch.confirmed_at = Some(block_number);
        batch.confirmed_by = Some(confirmer);
        batch.status = BatchStatus::Confirmed;
        Ok(())
    }

    /// Record the on-chain anchor, advance `last_anchored_block` and clear
    /// the batch.
    ///
    /// Returns the completed batch record for observability; it is no longer
    /// part of the state.
    pub fn mark_anchored(&mut self, block_number: u64, anchorer: Address) -> Result<BatchState> {
        let mut batch = match self.current_batch.take() {
            Some(b) if b.status == BatchStatus::Confirmed => b,
            other => {
                self.current_batch = other;
                return Err(ConsensusError::NotConfirmed);
            }
        };
        if !batch.status.can_transition_to(BatchStatus::Anchored) {
            self.current_batch = Some(batch);
            return Err(ConsensusError::InvalidTransition);
        }

        self.last_anchored_block = batch.end_block;
        batch.anchored_at = Some(block_number);
        batch.anchored_by = Some(anchorer);
        batch.status = BatchStatus::Anchored;
        Ok(batch)
    }

    /// Canonical encoding: UTF-8 JSON with declaration-ordered fields and
    /// absent optionals omitted. Equal states encode byte-identically.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a state from its canonical encoding.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Integrity hash: `keccak256(encode())`.
    pub fn hash(&self) -> Result<B256> {
        Ok(keccak256(self.encode()?))
    }
}
