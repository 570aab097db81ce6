//! Property-based tests for tree construction and proofs.

use proptest::prelude::*;

use alloy_primitives::B256;

use crate::{RuidProof, RuidTree};

/// Generate arbitrary RUID values.
fn arb_ruid() -> impl Strategy<Value = B256> {
    prop::array::uniform32(any::<u8>()).prop_map(B256::from)
}

/// Generate a vector of arbitrary RUIDs.
fn arb_ruids(max_count: usize) -> impl Strategy<Value = Vec<B256>> {
    prop::collection::vec(arb_ruid(), 0..max_count)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every member RUID verifies against the tree root.
    #[test]
    fn prop_membership_proofs_verify(ruids in arb_ruids(64)) {
        let tree = RuidTree::from_ruids(ruids.clone());
        for ruid in &ruids {
            let proof = tree.proof(ruid).expect("member must have a proof");
            prop_assert!(proof.verify_ruid(ruid));
            prop_assert_eq!(proof.root, tree.root());
        }
    }

    /// A RUID outside the tree either has no proof or fails verification.
    #[test]
    fn prop_non_member_fails(ruids in arb_ruids(64), outsider in arb_ruid()) {
        prop_assume!(!ruids.contains(&outsider));
        let tree = RuidTree::from_ruids(ruids.clone());

        prop_assert!(tree.proof(&outsider).is_err());
        if let Some(first) = ruids.first() {
            let proof = tree.proof(first).expect("member must have a proof");
            prop_assert!(!proof.verify_ruid(&outsider));
        }
    }

    /// The root is invariant under input permutation.
    #[test]
    fn prop_root_is_order_independent(ruids in arb_ruids(64)) {
        let tree = RuidTree::from_ruids(ruids.clone());
        let mut reversed = ruids;
        reversed.reverse();
        let tree2 = RuidTree::from_ruids(reversed);
        prop_assert_eq!(tree.root(), tree2.root());
    }

    /// Proof serialization round-trips exactly.
    #[test]
    fn prop_proof_roundtrip(ruids in arb_ruids(64), index in 0usize..64) {
        prop_assume!(!ruids.is_empty());
        let tree = RuidTree::from_ruids(ruids);
        let proof = tree.proof_at(index % tree.leaf_count()).expect("index in range");

        let restored = RuidProof::from_bytes(&proof.to_bytes()).expect("roundtrip");
        prop_assert_eq!(restored, proof);
    }
}
