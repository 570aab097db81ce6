//! OpenTimestamps client seam.
//!
//! The calendar client performs network I/O and is therefore kept outside
//! the consensus core. Calls are made only during block assembly, within the
//! producer's time budget; implementations must apply their own timeouts, and
//! any failure simply means no candidate transaction this block.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Result of stamping a digest into the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReceipt {
    /// Pending OpenTimestamps proof bytes returned by the calendar.
    pub proof: Vec<u8>,
    /// The digest the calendar committed to: `sha256(root)`.
    pub digest: B256,
}

/// Bitcoin confirmation status for a previously stamped digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcConfirmation {
    /// Whether the attestation has committed into a Bitcoin block.
    pub confirmed: bool,
    /// Bitcoin block height of the attestation.
    pub btc_block_height: u64,
    /// Bitcoin transaction id, hex encoded.
    pub btc_tx_id: String,
    /// Bitcoin block timestamp.
    pub btc_timestamp: u64,
}

impl BtcConfirmation {
    /// A not-yet-confirmed result.
    pub fn unconfirmed() -> Self {
        Self {
            confirmed: false,
            btc_block_height: 0,
            btc_tx_id: String::new(),
            btc_timestamp: 0,
        }
    }

    /// A confirmed result with the given Bitcoin facts.
    pub fn confirmed(btc_block_height: u64, btc_tx_id: impl Into<String>, btc_timestamp: u64) -> Self {
        Self {
            confirmed: true,
            btc_block_height,
            btc_tx_id: btc_tx_id.into(),
            btc_timestamp,
        }
    }
}

/// Client for the OpenTimestamps calendar and its Bitcoin poller.
pub trait OtsClient: Send + Sync {
    /// Submit a batch root to the calendar.
    ///
    /// Returns the pending proof and the sha256 digest the calendar tracks.
    fn stamp(&self, root: B256) -> Result<StampReceipt>;

    /// Check whether a stamped digest has a Bitcoin confirmation.
    fn check_confirmation(&self, digest: B256) -> Result<BtcConfirmation>;
}
