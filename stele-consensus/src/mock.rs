//! In-memory chain and OTS client for testing and development.
//!
//! The mock chain produces deterministic headers (hashes derived from number,
//! parent and timestamp) and serves receipts through the [`ChainReader`]
//! seam; the mock client scripts calendar behavior so producer paths can be
//! exercised without any network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy_primitives::{address, keccak256, Address, Bytes, B256};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use stele_core::{
    Header, Log, Receipt, ANCHORED_TOPIC, CLAIM_TOPIC, OTS_CONFIRMED_TOPIC, OTS_SUBMITTED_TOPIC,
    REGISTRY_ADDRESS,
};

use crate::chain::ChainReader;
use crate::client::{BtcConfirmation, OtsClient, StampReceipt};
use crate::errors::{ConsensusError, Result};

/// Claimant used by [`claim_log`].
pub const MOCK_CLAIMANT: Address = address!("abcdef1234567890abcdef1234567890abcdef12");

fn u64_slot(value: u64) -> [u8; 32] {
    let mut slot = [0u8; 32];
    slot[24..].copy_from_slice(&value.to_be_bytes());
    slot
}

fn registry_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
    Log {
        address: REGISTRY_ADDRESS,
        topics,
        data: Bytes::from(data),
        block_number: 0,
        tx_index: 0,
        log_index: 0,
        tx_hash: B256::ZERO,
        block_hash: B256::ZERO,
    }
}

/// Build a `CopyrightClaimed` log at the given chain position.
pub fn claim_log(ruid: B256, block_number: u64, tx_index: u32, log_index: u32) -> Log {
    let mut claimant_topic = B256::ZERO;
    claimant_topic[12..].copy_from_slice(MOCK_CLAIMANT.as_slice());

    let mut log = registry_log(
        vec![*CLAIM_TOPIC, ruid, claimant_topic],
        u64_slot(block_number).to_vec(),
    );
    log.block_number = block_number;
    log.tx_index = tx_index;
    log.log_index = log_index;
    log
}

/// Build an `OTSSubmitted` log.
pub fn ots_submitted_log(root_hash: B256, ots_digest: B256) -> Log {
    registry_log(
        vec![*OTS_SUBMITTED_TOPIC, root_hash],
        ots_digest.as_slice().to_vec(),
    )
}

/// Build an `OTSConfirmed` log.
pub fn ots_confirmed_log(
    root_hash: B256,
    btc_block_height: u64,
    btc_tx_id: B256,
    btc_timestamp: u64,
) -> Log {
    let mut data = Vec::with_capacity(96);
    data.extend_from_slice(&u64_slot(btc_block_height));
    data.extend_from_slice(btc_tx_id.as_slice());
    data.extend_from_slice(&u64_slot(btc_timestamp));
    registry_log(vec![*OTS_CONFIRMED_TOPIC, root_hash], data)
}

/// Build an `Anchored` log.
pub fn anchored_log(root_hash: B256, start_block: u64, end_block: u64, btc_block_height: u64) -> Log {
    let mut data = Vec::with_capacity(96);
    data.extend_from_slice(&u64_slot(start_block));
    data.extend_from_slice(&u64_slot(end_block));
    data.extend_from_slice(&u64_slot(btc_block_height));
    registry_log(vec![*ANCHORED_TOPIC, root_hash], data)
}

#[derive(Default)]
struct ChainData {
    headers_by_number: HashMap<u64, Header>,
    headers_by_hash: HashMap<B256, Header>,
    receipts: HashMap<B256, Vec<Receipt>>,
    nonces: HashMap<Address, u64>,
    tip: u64,
}

/// Deterministic in-memory chain.
#[derive(Default)]
pub struct MockChain {
    data: RwLock<ChainData>,
}

impl MockChain {
    /// Create an empty chain. Add a genesis block before anything else.
    pub fn new() -> Self {
        Self::default()
    }

    fn block_hash(number: u64, parent_hash: B256, timestamp: u64) -> B256 {
        let mut buf = [0u8; 48];
        buf[..8].copy_from_slice(&number.to_be_bytes());
        buf[8..40].copy_from_slice(parent_hash.as_slice());
        buf[40..].copy_from_slice(&timestamp.to_be_bytes());
        keccak256(buf)
    }

    /// Add the genesis block at number 0.
    pub fn add_genesis(&self, timestamp: u64) -> Header {
        let hash = Self::block_hash(0, B256::ZERO, timestamp);
        let header = Header::new(0, hash, B256::ZERO, Address::ZERO, timestamp);

        let mut data = self.data.write();
        data.headers_by_number.insert(0, header.clone());
        data.headers_by_hash.insert(hash, header.clone());
        data.tip = 0;
        header
    }

    /// Append a block on the current tip.
    pub fn add_block(&self, timestamp: u64, coinbase: Address, receipts: Vec<Receipt>) -> Header {
        let mut data = self.data.write();
        let number = data.tip + 1;
        let parent_hash = data
            .headers_by_number
            .get(&data.tip)
            .map(|h| h.hash)
            .unwrap_or(B256::ZERO);

        let hash = Self::block_hash(number, parent_hash, timestamp);
        let header = Header::new(number, hash, parent_hash, coinbase, timestamp);

        data.headers_by_number.insert(number, header.clone());
        data.headers_by_hash.insert(hash, header.clone());
        data.receipts.insert(hash, receipts);
        data.tip = number;
        header
    }

    /// Canonical header at the given number.
    pub fn header(&self, number: u64) -> Option<Header> {
        self.data.read().headers_by_number.get(&number).cloned()
    }

    /// Highest block number.
    pub fn tip(&self) -> u64 {
        self.data.read().tip
    }

    /// Set the nonce served for an account.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.data.write().nonces.insert(address, nonce);
    }
}

impl ChainReader for MockChain {
    fn receipts(&self, block_hash: B256, _block_number: u64) -> Option<Vec<Receipt>> {
        self.data.read().receipts.get(&block_hash).cloned()
    }

    fn header_by_hash(&self, block_hash: B256, _block_number: u64) -> Option<Header> {
        self.data.read().headers_by_hash.get(&block_hash).cloned()
    }

    fn header_by_number(&self, block_number: u64) -> Option<Header> {
        self.data.read().headers_by_number.get(&block_number).cloned()
    }

    fn nonce(&self, address: Address) -> u64 {
        self.data.read().nonces.get(&address).copied().unwrap_or(0)
    }
}

/// Scriptable OTS client.
pub struct MockOtsClient {
    confirmation: RwLock<BtcConfirmation>,
    fail_stamp: AtomicBool,
    fail_confirmation: AtomicBool,
    stamp_calls: AtomicU64,
    confirmation_calls: AtomicU64,
}

impl MockOtsClient {
    /// Create a client that stamps successfully and reports no confirmation.
    pub fn new() -> Self {
        Self {
            confirmation: RwLock::new(BtcConfirmation::unconfirmed()),
            fail_stamp: AtomicBool::new(false),
            fail_confirmation: AtomicBool::new(false),
            stamp_calls: AtomicU64::new(0),
            confirmation_calls: AtomicU64::new(0),
        }
    }

    /// Script the confirmation result returned by `check_confirmation`.
    pub fn set_confirmation(&self, confirmation: BtcConfirmation) {
        *self.confirmation.write() = confirmation;
    }

    /// Make `stamp` fail.
    pub fn set_fail_stamp(&self, fail: bool) {
        self.fail_stamp.store(fail, Ordering::Relaxed);
    }

    /// Make `check_confirmation` fail.
    pub fn set_fail_confirmation(&self, fail: bool) {
        self.fail_confirmation.store(fail, Ordering::Relaxed);
    }

    /// Number of `stamp` calls made.
    pub fn stamp_calls(&self) -> u64 {
        self.stamp_calls.load(Ordering::Relaxed)
    }

    /// Number of `check_confirmation` calls made.
    pub fn confirmation_calls(&self) -> u64 {
        self.confirmation_calls.load(Ordering::Relaxed)
    }
}

impl Default for MockOtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OtsClient for MockOtsClient {
    fn stamp(&self, root: B256) -> Result<StampReceipt> {
        self.stamp_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_stamp.load(Ordering::Relaxed) {
            return Err(ConsensusError::Client("simulated stamp failure".into()));
        }
        Ok(StampReceipt {
            proof: b"mock-pending-attestation".to_vec(),
            digest: B256::from_slice(&Sha256::digest(root.as_slice())),
        })
    }

    fn check_confirmation(&self, _digest: B256) -> Result<BtcConfirmation> {
        self.confirmation_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_confirmation.load(Ordering::Relaxed) {
            return Err(ConsensusError::Client(
                "simulated confirmation failure".into(),
            ));
        }
        Ok(self.confirmation.read().clone())
    }
}
