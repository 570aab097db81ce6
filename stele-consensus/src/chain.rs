//! Host-chain accessor seam.

use alloy_primitives::{Address, B256};

use stele_core::{Header, Receipt};

/// Read access to the host chain, injected by the node.
///
/// The consensus module never walks the chain itself: everything it learns
/// about blocks comes through this trait, which keeps the transition function
/// pure over its inputs and lets tests substitute an in-memory chain.
pub trait ChainReader: Send + Sync {
    /// Receipts of the block with the given hash and number.
    fn receipts(&self, block_hash: B256, block_number: u64) -> Option<Vec<Receipt>>;

    /// Header with the given hash and number.
    fn header_by_hash(&self, block_hash: B256, block_number: u64) -> Option<Header>;

    /// Canonical header at the given number.
    fn header_by_number(&self, block_number: u64) -> Option<Header>;

    /// Next nonce for the given account.
    fn nonce(&self, address: Address) -> u64;
}
