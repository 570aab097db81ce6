//! Host-chain value types consumed by the consensus module.
//!
//! These mirror what the host hands us during block processing and block
//! assembly. They carry only the fields the timestamping state machine needs;
//! the host's own richer types are converted at the boundary.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A block header as seen by the consensus module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block producer (coinbase) address.
    pub coinbase: Address,
    /// Block timestamp, UTC seconds.
    pub timestamp: u64,
}

impl Header {
    /// Create a new header value.
    pub fn new(number: u64, hash: B256, parent_hash: B256, coinbase: Address, timestamp: u64) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            coinbase,
            timestamp,
        }
    }
}

/// An event log emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract address.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// Non-indexed event data.
    pub data: Bytes,
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Index of the transaction within its block.
    pub tx_index: u32,
    /// Index of the log within its block.
    pub log_index: u32,
    /// Hash of the emitting transaction.
    pub tx_hash: B256,
    /// Hash of the containing block.
    pub block_hash: B256,
}

impl Log {
    /// The event signature topic, if any topics are present.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// A transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Whether the transaction executed successfully.
    pub success: bool,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// A successful receipt carrying the given logs.
    pub fn successful(logs: Vec<Log>) -> Self {
        Self {
            success: true,
            logs,
        }
    }

    /// A failed receipt. Failed transactions emit no observable logs.
    pub fn failed() -> Self {
        Self {
            success: false,
            logs: Vec::new(),
        }
    }
}

/// A transaction as submitted to or observed on the host chain.
///
/// System transactions are distinguished by `gas_price == 0` and a recipient
/// equal to the registry contract; see `stele-systx` for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender account nonce.
    pub nonce: u64,
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value.
    pub value: U256,
    /// Gas limit.
    pub gas: u64,
    /// Gas price; zero for system transactions.
    pub gas_price: U256,
    /// Call data.
    pub data: Bytes,
}

impl Transaction {
    /// Build a system transaction: zero value, zero gas price.
    pub fn system(nonce: u64, to: Address, gas: u64, data: Bytes) -> Self {
        Self {
            nonce,
            to: Some(to),
            value: U256::ZERO,
            gas,
            gas_price: U256::ZERO,
            data,
        }
    }

    /// The 4-byte function selector, when the call data is long enough.
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.data.len() < 4 {
            return None;
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&self.data[..4]);
        Some(sel)
    }
}
