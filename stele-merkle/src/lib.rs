//! RUID Merkle tree construction and inclusion proofs.
//!
//! Every batch of copyright claims is reduced to a single keccak256 Merkle
//! root. The root is the consensus datum: every validator must reproduce it
//! byte-for-byte, so construction is fully deterministic:
//!
//! - leaves are `keccak256(ruid)` over a deterministically ordered RUID list
//!   (chain position for event input, lexicographic for raw RUID input);
//! - layers with an odd node count duplicate their last node (Bitcoin style);
//! - each pair hashes as `keccak256(min(a,b) || max(a,b))`, so proof
//!   verification needs only the sibling path;
//! - the empty tree has the zero root.
//!
//! The value handed to the OpenTimestamps calendar is `sha256(root)`.
//!
//! # Example
//!
//! ```
//! use alloy_primitives::B256;
//! use stele_merkle::RuidTree;
//!
//! let ruids = vec![B256::repeat_byte(0x11), B256::repeat_byte(0x22)];
//! let tree = RuidTree::from_ruids(ruids);
//!
//! let proof = tree.proof(&B256::repeat_byte(0x22)).unwrap();
//! assert!(proof.verify_ruid(&B256::repeat_byte(0x22)));
//! assert_eq!(proof.root, tree.root());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod errors;
mod proof;
mod tree;

#[cfg(test)]
mod proptest;

pub use errors::{MerkleError, Result};
pub use proof::{ProofStep, RuidProof};
pub use tree::{hash_pair, RuidTree};
