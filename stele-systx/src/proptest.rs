//! Property-based tests for the calldata codec.

use proptest::prelude::*;

use alloy_primitives::B256;

use crate::codec::{AnchorCalldata, OtsConfirmedCall, OtsSubmittedCall, SystxKind};

fn arb_b256() -> impl Strategy<Value = B256> {
    prop::array::uniform32(any::<u8>()).prop_map(B256::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Anchor calldata round-trips for arbitrary field values.
    #[test]
    fn prop_anchor_roundtrip(
        start_block in any::<u64>(),
        end_block in any::<u64>(),
        batch_root in arb_b256(),
        btc_tx_hash in arb_b256(),
        btc_timestamp in any::<u64>(),
    ) {
        let call = AnchorCalldata {
            start_block,
            end_block,
            batch_root,
            btc_tx_hash,
            btc_timestamp,
        };
        let data = call.encode();
        prop_assert_eq!(SystxKind::from_calldata(&data), Some(SystxKind::Anchor));
        prop_assert_eq!(AnchorCalldata::decode(&data).unwrap(), call);
    }

    /// otsSubmitted calldata round-trips.
    #[test]
    fn prop_submitted_roundtrip(root_hash in arb_b256(), ots_digest in arb_b256()) {
        let call = OtsSubmittedCall { root_hash, ots_digest };
        prop_assert_eq!(OtsSubmittedCall::decode(&call.encode()).unwrap(), call);
    }

    /// otsConfirmed calldata round-trips.
    #[test]
    fn prop_confirmed_roundtrip(
        root_hash in arb_b256(),
        btc_block_height in any::<u64>(),
        btc_tx_id in arb_b256(),
        btc_timestamp in any::<u64>(),
    ) {
        let call = OtsConfirmedCall {
            root_hash,
            btc_block_height,
            btc_tx_id,
            btc_timestamp,
        };
        prop_assert_eq!(OtsConfirmedCall::decode(&call.encode()).unwrap(), call);
    }

    /// Truncated calldata never decodes.
    #[test]
    fn prop_truncated_anchor_rejected(cut in 0usize..164) {
        let call = AnchorCalldata {
            start_block: 1,
            end_block: 2,
            batch_root: B256::ZERO,
            btc_tx_hash: B256::ZERO,
            btc_timestamp: 3,
        };
        let data = call.encode();
        prop_assert!(AnchorCalldata::decode(&data[..cut]).is_err());
    }
}
