//! Property-based tests for state encoding determinism.

use proptest::prelude::*;

use alloy_primitives::{Address, B256};

use crate::snapshot::Snapshot;
use crate::state::OtsState;

fn arb_b256() -> impl Strategy<Value = B256> {
    prop::array::uniform32(any::<u8>()).prop_map(B256::from)
}

fn arb_address() -> impl Strategy<Value = Address> {
    prop::array::uniform20(any::<u8>()).prop_map(Address::from)
}

/// Generate states in every reachable batch stage by replaying the
/// operations, so all produced values are valid machine states.
fn arb_state() -> impl Strategy<Value = OtsState> {
    (
        any::<bool>(),
        0u64..1_000_000_000,
        0usize..5,
        arb_b256(),
        arb_b256(),
        arb_address(),
        any::<u64>(),
    )
        .prop_map(|(enabled, last_anchored, stage, root, digest, node, height)| {
            let mut state = OtsState::new(true);
            state.last_anchored_block = last_anchored;

            if stage >= 1 {
                state
                    .trigger(last_anchored + 1, last_anchored + 100, last_anchored + 101, node, root)
                    .expect("trigger from idle");
            }
            if stage >= 2 {
                state
                    .mark_submitted(digest, last_anchored + 102, node)
                    .expect("submit after trigger");
            }
            if stage >= 3 {
                state
                    .mark_confirmed(height, "ab".repeat(32), 1_700_000_000, last_anchored + 103, node)
                    .expect("confirm after submit");
            }
            if stage >= 4 {
                state
                    .mark_anchored(last_anchored + 104, node)
                    .expect("anchor after confirm");
            }

            state.enabled = enabled;
            state
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// States round-trip through the canonical encoding.
    #[test]
    fn prop_state_roundtrip(state in arb_state()) {
        let data = state.encode().unwrap();
        prop_assert_eq!(OtsState::decode(&data).unwrap(), state);
    }

    /// Equal states encode byte-identically, so hashes agree.
    #[test]
    fn prop_encoding_is_deterministic(state in arb_state()) {
        let copy = state.clone();
        prop_assert_eq!(state.encode().unwrap(), copy.encode().unwrap());
        prop_assert_eq!(state.hash().unwrap(), copy.hash().unwrap());
    }

    /// Snapshots round-trip through the canonical encoding.
    #[test]
    fn prop_snapshot_roundtrip(state in arb_state(), number in any::<u64>(), hash in arb_b256()) {
        let snapshot = Snapshot::new(number, hash, state);
        let data = snapshot.encode().unwrap();
        prop_assert_eq!(Snapshot::decode(&data).unwrap(), snapshot);
    }
}
