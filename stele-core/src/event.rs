//! Copyright-claim events emitted by the registry contract.
//!
//! The registry lives at a well-known address and emits one
//! `CopyrightClaimed` log per claim, carrying the 32-byte Record Unique ID
//! (RUID) as its first indexed topic. Events are ordered by the tuple
//! `(block number, transaction index, log index)` so every node derives the
//! same sequence from the same chain.

use alloy_primitives::{address, keccak256, Address, B256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Log;

/// Address of the copyright registry contract.
pub const REGISTRY_ADDRESS: Address = address!("0000000000000000000000000000000000009000");

/// Topic of `CopyrightClaimed(bytes32 indexed ruid, address indexed claimant, uint64 submitBlock)`.
pub static CLAIM_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"CopyrightClaimed(bytes32,address,uint64)"));

/// Topic of `OTSSubmitted(bytes32 indexed rootHash, bytes32 otsDigest)`.
pub static OTS_SUBMITTED_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"OTSSubmitted(bytes32,bytes32)"));

/// Topic of `OTSConfirmed(bytes32 indexed rootHash, uint64 btcBlockHeight, bytes32 btcTxId, uint64 btcTimestamp)`.
pub static OTS_CONFIRMED_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"OTSConfirmed(bytes32,uint64,bytes32,uint64)"));

/// Topic of `Anchored(bytes32 indexed rootHash, uint64 startBlock, uint64 endBlock, uint64 btcBlockHeight)`.
pub static ANCHORED_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Anchored(bytes32,uint64,uint64,uint64)"));

/// Position of a log within the chain, used as the event sort key.
///
/// Ordering is lexicographic over `(block_number, tx_index, log_index)`,
/// which the derived `Ord` provides given the field order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    /// Block number.
    pub block_number: u64,
    /// Transaction index within the block.
    pub tx_index: u32,
    /// Log index within the block.
    pub log_index: u32,
}

/// A parsed `CopyrightClaimed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimEvent {
    /// Record Unique ID of the claim.
    pub ruid: B256,
    /// Address that made the claim.
    pub claimant: Address,
    /// Block number the claimant declared at submission time.
    pub submit_block: u64,
    /// Chain position of the emitting log.
    pub sort_key: SortKey,
    /// Hash of the emitting transaction.
    pub tx_hash: B256,
    /// Hash of the containing block.
    pub block_hash: B256,
}

impl ClaimEvent {
    /// Parse a `CopyrightClaimed` event from a registry log.
    ///
    /// Expects `topics[0]` = event signature, `topics[1]` = RUID,
    /// `topics[2]` = claimant (address left-padded to 32 bytes) and a 32-byte
    /// data word holding the submit block number.
    pub fn from_log(log: &Log) -> Result<Self> {
        if log.address != REGISTRY_ADDRESS {
            return Err(Error::InvalidLog(format!(
                "log from {} is not the registry",
                log.address
            )));
        }
        if log.topics.len() < 3 {
            return Err(Error::InvalidLog(format!(
                "expected 3 topics, got {}",
                log.topics.len()
            )));
        }
        if log.topics[0] != *CLAIM_TOPIC {
            return Err(Error::InvalidLog("not a CopyrightClaimed event".into()));
        }
        if log.data.len() < 32 {
            return Err(Error::InvalidLog(format!(
                "expected 32 data bytes, got {}",
                log.data.len()
            )));
        }

        let claimant = Address::from_slice(&log.topics[2][12..]);
        let mut block_bytes = [0u8; 8];
        block_bytes.copy_from_slice(&log.data[24..32]);

        Ok(Self {
            ruid: log.topics[1],
            claimant,
            submit_block: u64::from_be_bytes(block_bytes),
            sort_key: SortKey {
                block_number: log.block_number,
                tx_index: log.tx_index,
                log_index: log.log_index,
            },
            tx_hash: log.tx_hash,
            block_hash: log.block_hash,
        })
    }

    /// Whether a log looks like a `CopyrightClaimed` event without fully parsing it.
    pub fn matches(log: &Log) -> bool {
        log.address == REGISTRY_ADDRESS
            && log.topics.len() >= 2
            && log.topics[0] == *CLAIM_TOPIC
    }
}
