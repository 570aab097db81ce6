//! Deterministic Merkle tree over RUIDs.

use alloy_primitives::{keccak256, B256};
use sha2::{Digest, Sha256};

use stele_core::ClaimEvent;

use crate::errors::{MerkleError, Result};
use crate::proof::{ProofStep, RuidProof};

/// Hash two nodes into their parent.
///
/// The pair is sorted lexicographically before concatenation, so
/// `hash_pair(a, b) == hash_pair(b, a)` and verification does not need to
/// know which side a sibling was on.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

/// A Merkle tree over an ordered RUID list.
///
/// All levels are materialized so proofs can be extracted without rehashing.
/// Odd levels store their duplicated last node, which keeps every non-root
/// level at an even length and makes the sibling of index `i` always `i ^ 1`.
#[derive(Debug, Clone)]
pub struct RuidTree {
    /// RUIDs in leaf order.
    ruids: Vec<B256>,
    /// Tree levels, leaves first, root level last. Empty for an empty tree.
    levels: Vec<Vec<B256>>,
}

impl RuidTree {
    /// Build a tree from raw RUIDs, ordered lexicographically by raw bytes.
    pub fn from_ruids(mut ruids: Vec<B256>) -> Self {
        ruids.sort();
        Self::build(ruids)
    }

    /// Build a tree from claim events, ordered by chain position
    /// `(block number, tx index, log index)`.
    pub fn from_events(events: &[ClaimEvent]) -> Self {
        let mut ordered: Vec<&ClaimEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.sort_key);
        Self::build(ordered.into_iter().map(|e| e.ruid).collect())
    }

    fn build(ruids: Vec<B256>) -> Self {
        if ruids.is_empty() {
            return Self {
                ruids,
                levels: Vec::new(),
            };
        }

        let mut level: Vec<B256> = ruids.iter().map(|r| keccak256(r.as_slice())).collect();
        // A lone leaf is combined with itself, same as any other odd level.
        if level.len() == 1 {
            level.push(level[0]);
        }

        let mut levels = Vec::new();
        loop {
            if level.len() % 2 == 1 {
                level.push(*level.last().expect("level is non-empty"));
            }
            levels.push(level.clone());

            let next: Vec<B256> = level.chunks(2).map(|p| hash_pair(p[0], p[1])).collect();
            if next.len() == 1 {
                levels.push(next);
                break;
            }
            level = next;
        }

        Self { ruids, levels }
    }

    /// The Merkle root; the zero hash for an empty tree.
    pub fn root(&self) -> B256 {
        self.levels
            .last()
            .map(|level| level[0])
            .unwrap_or(B256::ZERO)
    }

    /// The digest handed to the OpenTimestamps calendar: `sha256(root)`.
    pub fn ots_digest(&self) -> B256 {
        B256::from_slice(&Sha256::digest(self.root().as_slice()))
    }

    /// Number of RUID leaves (duplication padding excluded).
    pub fn leaf_count(&self) -> usize {
        self.ruids.len()
    }

    /// The RUIDs in leaf order.
    pub fn ruids(&self) -> &[B256] {
        &self.ruids
    }

    /// Whether the tree contains the given RUID.
    pub fn contains(&self, ruid: &B256) -> bool {
        self.ruids.contains(ruid)
    }

    /// Extract an inclusion proof for a RUID.
    ///
    /// For duplicate RUIDs the proof is taken at the first occurrence.
    pub fn proof(&self, ruid: &B256) -> Result<RuidProof> {
        let index = self
            .ruids
            .iter()
            .position(|r| r == ruid)
            .ok_or_else(|| MerkleError::RuidNotFound(format!("{ruid:#x}")))?;
        self.proof_at(index)
    }

    /// Extract an inclusion proof for the leaf at `index`.
    pub fn proof_at(&self, index: usize) -> Result<RuidProof> {
        if index >= self.ruids.len() {
            return Err(MerkleError::RuidNotFound(format!("leaf index {index}")));
        }

        let mut steps = Vec::with_capacity(self.levels.len());
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = level[idx ^ 1];
            let current = level[idx];
            steps.push(ProofStep {
                sibling,
                current_was_left: current <= sibling,
            });
            idx /= 2;
        }

        Ok(RuidProof {
            leaf: self.levels[0][index],
            root: self.root(),
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use stele_core::SortKey;

    fn ruid(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    fn event(byte: u8, block_number: u64, tx_index: u32) -> ClaimEvent {
        ClaimEvent {
            ruid: ruid(byte),
            claimant: Address::ZERO,
            submit_block: block_number,
            sort_key: SortKey {
                block_number,
                tx_index,
                log_index: 0,
            },
            tx_hash: B256::ZERO,
            block_hash: B256::ZERO,
        }
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let tree = RuidTree::from_ruids(Vec::new());
        assert_eq!(tree.root(), B256::ZERO);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.proof(&ruid(0x11)).is_err());
    }

    #[test]
    fn single_ruid_combines_leaf_with_itself() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11)]);
        let leaf = keccak256(ruid(0x11).as_slice());
        assert_eq!(tree.root(), hash_pair(leaf, leaf));

        let proof = tree.proof(&ruid(0x11)).unwrap();
        assert!(proof.verify_ruid(&ruid(0x11)));
    }

    #[test]
    fn odd_count_duplicates_last_node() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33)]);

        // Manual reconstruction: three leaves, last duplicated.
        let leaves: Vec<B256> = [ruid(0x11), ruid(0x22), ruid(0x33)]
            .iter()
            .map(|r| keccak256(r.as_slice()))
            .collect();
        let left = hash_pair(leaves[0], leaves[1]);
        let right = hash_pair(leaves[2], leaves[2]);
        assert_eq!(tree.root(), hash_pair(left, right));
    }

    #[test]
    fn input_order_does_not_matter_for_ruid_trees() {
        let forward = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33)]);
        let reversed = RuidTree::from_ruids(vec![ruid(0x33), ruid(0x22), ruid(0x11)]);
        assert_eq!(forward.root(), reversed.root());
    }

    #[test]
    fn event_trees_order_by_chain_position() {
        // Chain order 0x11, 0x33, 0x22, 0x44 regardless of slice order.
        let ordered = [
            event(0x11, 100, 0),
            event(0x33, 100, 1),
            event(0x22, 101, 0),
            event(0x44, 102, 0),
        ];
        let shuffled = [
            ordered[2].clone(),
            ordered[0].clone(),
            ordered[3].clone(),
            ordered[1].clone(),
        ];

        let tree = RuidTree::from_events(&ordered);
        assert_eq!(tree.root(), RuidTree::from_events(&shuffled).root());
        assert_eq!(tree.ruids(), &[ruid(0x11), ruid(0x33), ruid(0x22), ruid(0x44)]);

        // Chain order pairs (0x11, 0x33) and (0x22, 0x44); lexicographic
        // order pairs (0x11, 0x22) and (0x33, 0x44). Different pairings,
        // different roots.
        let lexicographic =
            RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33), ruid(0x44)]);
        assert_ne!(tree.root(), lexicographic.root());

        let proof = tree.proof(&ruid(0x33)).unwrap();
        assert!(proof.verify_ruid(&ruid(0x33)));
    }

    #[test]
    fn pair_hash_is_symmetric() {
        let a = ruid(0xaa);
        let b = ruid(0xbb);
        assert_eq!(hash_pair(a, b), hash_pair(b, a));
        assert_ne!(hash_pair(a, a), hash_pair(a, b));
    }

    #[test]
    fn ots_digest_is_sha256_of_root() {
        let tree = RuidTree::from_ruids(vec![ruid(0x42)]);
        let expected = Sha256::digest(tree.root().as_slice());
        assert_eq!(tree.ots_digest().as_slice(), expected.as_slice());
    }

    #[test]
    fn all_leaves_prove_membership() {
        let ruids: Vec<B256> = (1..=7).map(ruid).collect();
        let tree = RuidTree::from_ruids(ruids.clone());

        for r in &ruids {
            let proof = tree.proof(r).unwrap();
            assert!(proof.verify_ruid(r), "proof failed for {r:#x}");
            assert_eq!(proof.root, tree.root());
        }
    }

    #[test]
    fn wrong_ruid_fails_verification() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33), ruid(0x44)]);
        let proof = tree.proof(&ruid(0x11)).unwrap();
        assert!(!proof.verify_ruid(&ruid(0x22)));
        assert!(!proof.verify_ruid(&ruid(0x99)));
    }
}
