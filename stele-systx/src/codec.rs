//! Fixed-layout calldata encoders and decoders.
//!
//! Layout rules, shared by all three calls:
//!
//! - the first 4 bytes are the function selector
//!   (`keccak256(signature)[..4]`);
//! - every parameter occupies one 32-byte slot;
//! - `uint64` values sit big-endian in the last 8 bytes of their slot,
//!   leading 24 bytes zero;
//! - `bytes32` values are copied verbatim.

use alloy_primitives::{keccak256, Bytes, B256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SystxError};

/// Selector of `anchor(uint64 startBlock, uint64 endBlock, bytes32 batchRoot, bytes32 btcTxHash, uint64 btcTimestamp)`.
pub static ANCHOR_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| selector(b"anchor(uint64,uint64,bytes32,bytes32,uint64)"));

/// Selector of `otsSubmitted(bytes32 rootHash, bytes32 otsDigest)`.
pub static OTS_SUBMITTED_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| selector(b"otsSubmitted(bytes32,bytes32)"));

/// Selector of `otsConfirmed(bytes32 rootHash, uint64 btcBlockHeight, bytes32 btcTxId, uint64 btcTimestamp)`.
pub static OTS_CONFIRMED_SELECTOR: Lazy<[u8; 4]> =
    Lazy::new(|| selector(b"otsConfirmed(bytes32,uint64,bytes32,uint64)"));

/// Calldata length of an `anchor` call: selector + 5 slots.
pub const ANCHOR_CALLDATA_LEN: usize = 4 + 32 * 5;

/// Calldata length of an `otsSubmitted` call: selector + 2 slots.
pub const OTS_SUBMITTED_CALLDATA_LEN: usize = 4 + 32 * 2;

/// Calldata length of an `otsConfirmed` call: selector + 4 slots.
pub const OTS_CONFIRMED_CALLDATA_LEN: usize = 4 + 32 * 4;

fn selector(signature: &[u8]) -> [u8; 4] {
    let hash = keccak256(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// The three recognized system calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystxKind {
    /// `anchor(...)`: records the Bitcoin proof for a confirmed batch.
    Anchor,
    /// `otsSubmitted(...)`: records the calendar submission.
    OtsSubmitted,
    /// `otsConfirmed(...)`: records the Bitcoin confirmation.
    OtsConfirmed,
}

impl SystxKind {
    /// Identify a call from its selector.
    pub fn from_selector(sel: [u8; 4]) -> Option<Self> {
        if sel == *ANCHOR_SELECTOR {
            Some(SystxKind::Anchor)
        } else if sel == *OTS_SUBMITTED_SELECTOR {
            Some(SystxKind::OtsSubmitted)
        } else if sel == *OTS_CONFIRMED_SELECTOR {
            Some(SystxKind::OtsConfirmed)
        } else {
            None
        }
    }

    /// Identify a call from raw calldata.
    pub fn from_calldata(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        Self::from_selector([data[0], data[1], data[2], data[3]])
    }

    /// Minimum calldata length for this call.
    pub fn min_calldata_len(&self) -> usize {
        match self {
            SystxKind::Anchor => ANCHOR_CALLDATA_LEN,
            SystxKind::OtsSubmitted => OTS_SUBMITTED_CALLDATA_LEN,
            SystxKind::OtsConfirmed => OTS_CONFIRMED_CALLDATA_LEN,
        }
    }
}

/// Wire representation of a batch anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorCalldata {
    /// First block of the anchored range.
    pub start_block: u64,
    /// Last block of the anchored range.
    pub end_block: u64,
    /// Merkle root of the batch; zero for an empty batch.
    pub batch_root: B256,
    /// Bitcoin transaction containing the attestation; zero when unknown.
    pub btc_tx_hash: B256,
    /// Bitcoin block timestamp of the attestation.
    pub btc_timestamp: u64,
}

/// Parameters of an `otsSubmitted` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtsSubmittedCall {
    /// Batch root submitted to the calendar.
    pub root_hash: B256,
    /// Digest handed to the calendar: `sha256(root)`.
    pub ots_digest: B256,
}

/// Parameters of an `otsConfirmed` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtsConfirmedCall {
    /// Batch root the confirmation refers to.
    pub root_hash: B256,
    /// Bitcoin block height of the attestation.
    pub btc_block_height: u64,
    /// Bitcoin transaction id of the attestation.
    pub btc_tx_id: B256,
    /// Bitcoin block timestamp of the attestation.
    pub btc_timestamp: u64,
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&[0u8; 24]);
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_b256(out: &mut Vec<u8>, value: B256) {
    out.extend_from_slice(value.as_slice());
}

fn read_u64(slot: &[u8]) -> u64 {
    u64::from_be_bytes(slot[24..32].try_into().expect("8-byte slice"))
}

fn read_b256(slot: &[u8]) -> B256 {
    B256::from_slice(&slot[..32])
}

fn check_layout(data: &[u8], expected_selector: [u8; 4], expected_len: usize) -> Result<()> {
    if data.len() != expected_len {
        return Err(SystxError::InvalidCalldata(format!(
            "expected {expected_len} bytes, got {}",
            data.len()
        )));
    }
    if data[..4] != expected_selector {
        return Err(SystxError::InvalidCalldata("selector mismatch".into()));
    }
    Ok(())
}

impl AnchorCalldata {
    /// Encode to calldata.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(ANCHOR_CALLDATA_LEN);
        out.extend_from_slice(&*ANCHOR_SELECTOR);
        put_u64(&mut out, self.start_block);
        put_u64(&mut out, self.end_block);
        put_b256(&mut out, self.batch_root);
        put_b256(&mut out, self.btc_tx_hash);
        put_u64(&mut out, self.btc_timestamp);
        Bytes::from(out)
    }

    /// Decode from calldata. Fails unless the length and selector match exactly.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(data, *ANCHOR_SELECTOR, ANCHOR_CALLDATA_LEN)?;
        Ok(Self {
            start_block: read_u64(&data[4..36]),
            end_block: read_u64(&data[36..68]),
            batch_root: read_b256(&data[68..100]),
            btc_tx_hash: read_b256(&data[100..132]),
            btc_timestamp: read_u64(&data[132..164]),
        })
    }
}

impl OtsSubmittedCall {
    /// Encode to calldata.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(OTS_SUBMITTED_CALLDATA_LEN);
        out.extend_from_slice(&*OTS_SUBMITTED_SELECTOR);
        put_b256(&mut out, self.root_hash);
        put_b256(&mut out, self.ots_digest);
        Bytes::from(out)
    }

    /// Decode from calldata. Fails unless the length and selector match exactly.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(data, *OTS_SUBMITTED_SELECTOR, OTS_SUBMITTED_CALLDATA_LEN)?;
        Ok(Self {
            root_hash: read_b256(&data[4..36]),
            ots_digest: read_b256(&data[36..68]),
        })
    }
}

impl OtsConfirmedCall {
    /// Encode to calldata.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(OTS_CONFIRMED_CALLDATA_LEN);
        out.extend_from_slice(&*OTS_CONFIRMED_SELECTOR);
        put_b256(&mut out, self.root_hash);
        put_u64(&mut out, self.btc_block_height);
        put_b256(&mut out, self.btc_tx_id);
        put_u64(&mut out, self.btc_timestamp);
        Bytes::from(out)
    }

    /// Decode from calldata. Fails unless the length and selector match exactly.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(data, *OTS_CONFIRMED_SELECTOR, OTS_CONFIRMED_CALLDATA_LEN)?;
        Ok(Self {
            root_hash: read_b256(&data[4..36]),
            btc_block_height: read_u64(&data[36..68]),
            btc_tx_id: read_b256(&data[68..100]),
            btc_timestamp: read_u64(&data[100..132]),
        })
    }
}

/// Normalize a Bitcoin transaction id into a 32-byte hash.
///
/// Strips an optional `0x` prefix; an empty string yields the zero hash.
/// Shorter values are left-padded, longer values keep their last 32 bytes,
/// matching big-endian hash parsing.
pub fn btc_txid_to_hash(txid: &str) -> Result<B256> {
    let stripped = txid.strip_prefix("0x").unwrap_or(txid);
    if stripped.is_empty() {
        return Ok(B256::ZERO);
    }

    let padded = if stripped.len() % 2 == 1 {
        format!("0{stripped}")
    } else {
        stripped.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| SystxError::InvalidCalldata(format!("invalid BTC txid hex: {e}")))?;

    let mut out = B256::ZERO;
    if bytes.len() >= 32 {
        out.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        out[32 - bytes.len()..].copy_from_slice(&bytes);
    }
    Ok(out)
}
