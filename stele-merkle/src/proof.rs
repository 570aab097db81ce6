//! Inclusion proofs and their wire encoding.

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::errors::{MerkleError, Result};
use crate::tree::hash_pair;

/// One step of a proof path: the sibling at that level.
///
/// `current_was_left` records whether the walker's node was the left input to
/// the pair hash (equivalently, whether the sibling compared greater). The
/// combine sorts its inputs, so the flag is advisory and exists only to keep
/// the wire format self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStep {
    /// Sibling hash at this level.
    pub sibling: B256,
    /// Whether the current node sorted before the sibling.
    pub current_was_left: bool,
}

/// An inclusion proof for a single RUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuidProof {
    /// The leaf hash, `keccak256(ruid)`.
    pub leaf: B256,
    /// The root this proof commits to.
    pub root: B256,
    /// Sibling path from leaf to root.
    pub steps: Vec<ProofStep>,
}

/// Serialized size of one proof step: 32-byte sibling plus 1 flag byte.
const STEP_SIZE: usize = 33;

/// Serialized size of the fixed header: leaf, root, step count.
const HEADER_SIZE: usize = 32 + 32 + 4;

impl RuidProof {
    /// Verify that `ruid` is committed to by `root`.
    ///
    /// Recomputes the leaf hash and folds the sibling path; the stored leaf
    /// must match as well, so a proof lifted from another RUID fails.
    pub fn verify_ruid(&self, ruid: &B256) -> bool {
        let leaf = keccak256(ruid.as_slice());
        leaf == self.leaf && self.fold(leaf) == self.root
    }

    /// Verify the stored leaf against the stored root.
    pub fn verify(&self) -> bool {
        self.fold(self.leaf) == self.root
    }

    fn fold(&self, leaf: B256) -> B256 {
        self.steps
            .iter()
            .fold(leaf, |node, step| hash_pair(node, step.sibling))
    }

    /// Encode to the wire format:
    /// `leaf(32) || root(32) || count(u32 BE) || count * (sibling(32) || flag(1))`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.steps.len() * STEP_SIZE);
        out.extend_from_slice(self.leaf.as_slice());
        out.extend_from_slice(self.root.as_slice());
        out.extend_from_slice(&(self.steps.len() as u32).to_be_bytes());
        for step in &self.steps {
            out.extend_from_slice(step.sibling.as_slice());
            out.push(step.current_was_left as u8);
        }
        out
    }

    /// Decode from the wire format.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(MerkleError::InvalidProof(format!(
                "proof too short: {} bytes",
                data.len()
            )));
        }

        let leaf = B256::from_slice(&data[0..32]);
        let root = B256::from_slice(&data[32..64]);
        let count = u32::from_be_bytes(data[64..68].try_into().expect("4-byte slice")) as usize;

        let body = &data[HEADER_SIZE..];
        if body.len() != count * STEP_SIZE {
            return Err(MerkleError::InvalidProof(format!(
                "expected {} step bytes, got {}",
                count * STEP_SIZE,
                body.len()
            )));
        }

        let mut steps = Vec::with_capacity(count);
        for chunk in body.chunks_exact(STEP_SIZE) {
            let flag = match chunk[32] {
                0 => false,
                1 => true,
                other => {
                    return Err(MerkleError::InvalidProof(format!(
                        "invalid direction flag {other}"
                    )))
                }
            };
            steps.push(ProofStep {
                sibling: B256::from_slice(&chunk[..32]),
                current_was_left: flag,
            });
        }

        Ok(Self { leaf, root, steps })
    }

    /// Encoded size in bytes.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.steps.len() * STEP_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::RuidTree;

    fn ruid(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    #[test]
    fn roundtrip_preserves_proof() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33)]);
        let proof = tree.proof(&ruid(0x22)).unwrap();

        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), proof.encoded_size());

        let restored = RuidProof::from_bytes(&bytes).unwrap();
        assert_eq!(restored, proof);
        assert_eq!(restored.root, tree.root());
        assert!(restored.verify_ruid(&ruid(0x22)));
    }

    #[test]
    fn truncated_proof_is_rejected() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22)]);
        let bytes = tree.proof(&ruid(0x11)).unwrap().to_bytes();

        assert!(RuidProof::from_bytes(&bytes[..HEADER_SIZE - 1]).is_err());
        assert!(RuidProof::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn bad_direction_flag_is_rejected() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22)]);
        let mut bytes = tree.proof(&ruid(0x11)).unwrap().to_bytes();
        *bytes.last_mut().unwrap() = 7;
        assert!(RuidProof::from_bytes(&bytes).is_err());
    }

    #[test]
    fn tampered_root_fails_verification() {
        let tree = RuidTree::from_ruids(vec![ruid(0x11), ruid(0x22), ruid(0x33), ruid(0x44)]);
        let mut proof = tree.proof(&ruid(0x33)).unwrap();
        proof.root = B256::repeat_byte(0xff);
        assert!(!proof.verify());
        assert!(!proof.verify_ruid(&ruid(0x33)));
    }

    #[test]
    fn empty_step_proof_roundtrips() {
        // Not produced by the tree (a lone leaf still has one step), but the
        // wire format allows it and decode must handle it.
        let proof = RuidProof {
            leaf: ruid(0x01),
            root: ruid(0x02),
            steps: Vec::new(),
        };
        let restored = RuidProof::from_bytes(&proof.to_bytes()).unwrap();
        assert_eq!(restored, proof);
    }
}
