//! Deterministic state transitions driven by block contents.
//!
//! `process_block` is the sole state-advancing operation: given a header and
//! the parent snapshot it produces the child snapshot as a pure function of
//! `(parent state, header, receipts)`. Four rules apply in sequence; their
//! guards are mutually exclusive by batch status, so at most one fires per
//! block for a given batch:
//!
//! 1. **Trigger** — the block crosses the daily UTC boundary and no batch is
//!    active: open a batch over `[last_anchored + 1, number - 1]`.
//! 2. **Submit** — an `OTSSubmitted` event for the current root: record the
//!    calendar digest.
//! 3. **Confirm** — an `OTSConfirmed` event for the current root: record the
//!    Bitcoin facts.
//! 4. **Anchor** — an `Anchored` event for the current root: complete the
//!    batch.
//!
//! A failing transition is logged and ignored for that block; block validity
//! is the host chain's concern.

use std::sync::Arc;

use alloy_primitives::B256;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use tracing::{debug, info, warn};

use stele_core::{
    ClaimEvent, Header, Receipt, ANCHORED_TOPIC, OTS_CONFIRMED_TOPIC, OTS_SUBMITTED_TOPIC,
    REGISTRY_ADDRESS,
};
use stele_merkle::RuidTree;

use crate::chain::ChainReader;
use crate::errors::{ConsensusError, Result};
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::state::{BatchStatus, OtsState};

/// Hour (0-23, UTC) at which the daily batch is triggered.
pub const TRIGGER_HOUR_UTC: u32 = 0;

/// Calendar submission parsed from an `OTSSubmitted` event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OtsSubmission {
    digest: B256,
}

/// Bitcoin confirmation parsed from an `OTSConfirmed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BtcConfirmationEvent {
    btc_block_height: u64,
    btc_tx_id: String,
    btc_timestamp: u64,
}

/// Collect RUIDs from `CopyrightClaimed` events in the block range.
///
/// Blocks or receipts the chain cannot produce are skipped; failed receipts
/// are ignored. RUIDs are returned in chain scan order.
pub fn collect_ruids(chain: &dyn ChainReader, start_block: u64, end_block: u64) -> Vec<B256> {
    let mut ruids = Vec::new();
    if end_block < start_block {
        return ruids;
    }

    for number in start_block..=end_block {
        let Some(header) = chain.header_by_number(number) else {
            continue;
        };
        let Some(receipts) = chain.receipts(header.hash, number) else {
            continue;
        };
        for receipt in &receipts {
            if !receipt.success {
                continue;
            }
            for log in &receipt.logs {
                if ClaimEvent::matches(log) {
                    ruids.push(log.topics[1]);
                }
            }
        }
    }
    ruids
}

/// Applies blocks to OTS state and emits snapshots.
pub struct TransitionEngine {
    snapshots: Arc<SnapshotManager>,
    chain: Arc<dyn ChainReader>,
}

impl TransitionEngine {
    /// Create an engine over the snapshot manager and chain accessors.
    pub fn new(snapshots: Arc<SnapshotManager>, chain: Arc<dyn ChainReader>) -> Self {
        Self { snapshots, chain }
    }

    /// Apply a block to the parent snapshot's state and return the child
    /// snapshot.
    ///
    /// The child is handed to the snapshot manager; a store failure is a
    /// warning, not a block failure.
    pub fn process_block(&self, header: &Header, parent: &Snapshot) -> Result<Snapshot> {
        let mut state = parent.state.clone();

        if !state.enabled {
            return Ok(Snapshot::new(header.number, header.hash, state));
        }

        let receipts = self
            .chain
            .receipts(header.hash, header.number)
            .unwrap_or_default();

        self.apply_transitions(&mut state, header, &receipts);

        let snapshot = Snapshot::new(header.number, header.hash, state);
        if let Err(e) = self.snapshots.store_snapshot(&snapshot) {
            warn!(number = header.number, error = %e, "failed to store OTS snapshot");
        }
        Ok(snapshot)
    }

    /// Replay blocks from a snapshot up to `target_number`.
    pub fn rebuild_state(&self, from: &Snapshot, target_number: u64) -> Result<Snapshot> {
        let mut current = from.clone();
        for number in from.number + 1..=target_number {
            let header = self
                .chain
                .header_by_number(number)
                .ok_or(ConsensusError::SnapshotNotFound)?;
            current = self.process_block(&header, &current)?;
        }
        Ok(current)
    }

    fn apply_transitions(&self, state: &mut OtsState, header: &Header, receipts: &[Receipt]) {
        let block_number = header.number;
        let coinbase = header.coinbase;

        // Rules 2-4 are guarded by the batch status at block entry, which
        // makes them mutually exclusive: at most one rule fires per block.
        let entry = state
            .current_batch
            .as_ref()
            .map(|b| (b.status, b.root_hash));

        // Rule 1: open a new batch at the daily boundary.
        if state.can_trigger() && self.is_trigger_block(header) {
            self.handle_trigger(state, header);
        }

        // Rule 2: calendar submission recorded on-chain.
        if let Some((BatchStatus::Triggered, root)) = entry {
            if let Some(submission) = extract_submission(receipts, root) {
                match state.mark_submitted(submission.digest, block_number, coinbase) {
                    Ok(()) => info!(
                        block = block_number,
                        digest = %submission.digest,
                        "batch marked as submitted"
                    ),
                    Err(e) => debug!(block = block_number, error = %e, "failed to mark submitted"),
                }
            }
        }

        // Rule 3: Bitcoin confirmation recorded on-chain.
        if let Some((BatchStatus::Submitted, root)) = entry {
            if let Some(confirmation) = extract_confirmation(receipts, root) {
                match state.mark_confirmed(
                    confirmation.btc_block_height,
                    confirmation.btc_tx_id.clone(),
                    confirmation.btc_timestamp,
                    block_number,
                    coinbase,
                ) {
                    Ok(()) => info!(
                        block = block_number,
                        btc_block = confirmation.btc_block_height,
                        btc_tx_id = %confirmation.btc_tx_id,
                        "batch marked as confirmed"
                    ),
                    Err(e) => debug!(block = block_number, error = %e, "failed to mark confirmed"),
                }
            }
        }

        // Rule 4: anchor landed on-chain.
        if let Some((BatchStatus::Confirmed, root)) = entry {
            if has_anchor_event(receipts, root) {
                match state.mark_anchored(block_number, coinbase) {
                    Ok(completed) => info!(
                        block = block_number,
                        last_anchored_block = state.last_anchored_block,
                        root_hash = %completed.root_hash,
                        "batch anchored"
                    ),
                    Err(e) => debug!(block = block_number, error = %e, "failed to mark anchored"),
                }
            }
        }
    }

    /// Whether this block crosses the daily trigger boundary.
    ///
    /// True iff the block's UTC `(year, day)` strictly exceeds the parent's
    /// and the block hour has reached the trigger hour, or both blocks share
    /// the day and the parent hour was still below it. With the trigger hour
    /// at midnight the same-day branch never fires; the cross-day branch is
    /// the only trigger path.
    #[allow(unused_comparisons)]
    fn is_trigger_block(&self, header: &Header) -> bool {
        if header.number == 0 {
            return false;
        }
        let Some(parent) = self
            .chain
            .header_by_hash(header.parent_hash, header.number - 1)
        else {
            return false;
        };

        let (Some(current), Some(parent)) = (utc_time(header.timestamp), utc_time(parent.timestamp))
        else {
            return false;
        };

        if (current.year(), current.ordinal()) > (parent.year(), parent.ordinal()) {
            return current.hour() >= TRIGGER_HOUR_UTC;
        }

        parent.hour() < TRIGGER_HOUR_UTC && current.hour() >= TRIGGER_HOUR_UTC
    }

    fn handle_trigger(&self, state: &mut OtsState, header: &Header) {
        let block_number = header.number;
        let start_block = state.last_anchored_block + 1;
        let end_block = block_number - 1;

        if end_block < start_block {
            debug!(start_block, end_block, "no blocks to anchor at trigger");
            return;
        }

        let root_hash = self.calculate_root_hash(start_block, end_block);

        match state.trigger(start_block, end_block, block_number, header.coinbase, root_hash) {
            Ok(()) => info!(
                start_block,
                end_block,
                trigger_block = block_number,
                root_hash = %root_hash,
                "batch triggered"
            ),
            Err(e) => debug!(block = block_number, error = %e, "failed to trigger batch"),
        }
    }

    /// Merkle root over the RUIDs claimed in the block range.
    pub fn calculate_root_hash(&self, start_block: u64, end_block: u64) -> B256 {
        let ruids = collect_ruids(self.chain.as_ref(), start_block, end_block);
        RuidTree::from_ruids(ruids).root()
    }
}

fn utc_time(timestamp: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp as i64, 0).single()
}

/// Scan successful receipts for a registry log with the given topic and a
/// rootHash topic equal to `expected_root`; mismatches are skipped, the
/// first match wins.
fn registry_logs<'a>(
    receipts: &'a [Receipt],
    topic0: B256,
    expected_root: B256,
) -> impl Iterator<Item = &'a stele_core::Log> {
    receipts
        .iter()
        .filter(|r| r.success)
        .flat_map(|r| r.logs.iter())
        .filter(move |log| {
            log.address == REGISTRY_ADDRESS
                && log.topics.len() >= 2
                && log.topics[0] == topic0
                && log.topics[1] == expected_root
        })
}

fn extract_submission(receipts: &[Receipt], expected_root: B256) -> Option<OtsSubmission> {
    registry_logs(receipts, *OTS_SUBMITTED_TOPIC, expected_root).find_map(|log| {
        if log.data.len() < 32 {
            return None;
        }
        Some(OtsSubmission {
            digest: B256::from_slice(&log.data[..32]),
        })
    })
}

fn extract_confirmation(receipts: &[Receipt], expected_root: B256) -> Option<BtcConfirmationEvent> {
    registry_logs(receipts, *OTS_CONFIRMED_TOPIC, expected_root).find_map(|log| {
        // Data: btcBlockHeight (32) || btcTxId (32) || btcTimestamp (32).
        if log.data.len() < 96 {
            return None;
        }
        let height = u64::from_be_bytes(log.data[24..32].try_into().expect("8-byte slice"));
        let timestamp = u64::from_be_bytes(log.data[88..96].try_into().expect("8-byte slice"));
        Some(BtcConfirmationEvent {
            btc_block_height: height,
            btc_tx_id: hex::encode(&log.data[32..64]),
            btc_timestamp: timestamp,
        })
    })
}

fn has_anchor_event(receipts: &[Receipt], expected_root: B256) -> bool {
    registry_logs(receipts, *ANCHORED_TOPIC, expected_root)
        .next()
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{
        anchored_log, claim_log, ots_confirmed_log, ots_submitted_log, MockChain,
    };
    use alloy_primitives::address;
    use stele_storage::MemoryKvStore;

    const COINBASE: alloy_primitives::Address =
        address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

    /// 2023-11-14 22:13:20 UTC.
    const MID_DAY: u64 = 1_700_000_000;
    /// Seconds per day.
    const DAY: u64 = 86_400;

    fn engine(chain: Arc<MockChain>) -> (TransitionEngine, Arc<SnapshotManager>) {
        let snapshots = Arc::new(SnapshotManager::new(Arc::new(MemoryKvStore::new()), true));
        (TransitionEngine::new(snapshots.clone(), chain), snapshots)
    }

    /// Midnight after the day containing `ts`.
    fn next_midnight(ts: u64) -> u64 {
        (ts / DAY + 1) * DAY
    }

    #[test]
    fn trigger_fires_on_midnight_crossing() {
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(MID_DAY);
        let b1 = chain.add_block(MID_DAY + 10, COINBASE, vec![]);
        let b2 = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain);
        let parent = snapshots.genesis_snapshot(genesis.hash);

        let snap1 = engine.process_block(&b1, &parent).unwrap();
        assert!(snap1.state.current_batch.is_none());

        let snap2 = engine.process_block(&b2, &snap1).unwrap();
        let batch = snap2.state.current_batch.as_ref().expect("batch triggered");
        assert_eq!(batch.status, BatchStatus::Triggered);
        assert_eq!(batch.start_block, 1);
        assert_eq!(batch.end_block, 1);
        assert_eq!(batch.trigger_block, 2);
        assert_eq!(batch.trigger_node, COINBASE);
    }

    #[test]
    fn no_trigger_within_the_same_day() {
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(MID_DAY);
        let b1 = chain.add_block(MID_DAY + 100, COINBASE, vec![]);
        let b2 = chain.add_block(MID_DAY + 200, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain);
        let parent = snapshots.genesis_snapshot(genesis.hash);
        let snap1 = engine.process_block(&b1, &parent).unwrap();
        let snap2 = engine.process_block(&b2, &snap1).unwrap();
        assert!(snap2.state.current_batch.is_none());
    }

    #[test]
    fn no_trigger_for_same_second_blocks() {
        let chain = Arc::new(MockChain::new());
        let midnight = next_midnight(MID_DAY);
        let genesis = chain.add_genesis(midnight);
        let b1 = chain.add_block(midnight, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain);
        let parent = snapshots.genesis_snapshot(genesis.hash);
        let snap = engine.process_block(&b1, &parent).unwrap();
        assert!(snap.state.current_batch.is_none());
    }

    #[test]
    fn trigger_fires_across_the_year_boundary() {
        // 2023-12-31 23:59:50 UTC -> 2024-01-01 00:00:10 UTC.
        let new_year = 1_704_067_200u64;
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(new_year - 20);
        let b1 = chain.add_block(new_year - 10, COINBASE, vec![]);
        let b2 = chain.add_block(new_year + 10, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain);
        let parent = snapshots.genesis_snapshot(genesis.hash);
        let snap1 = engine.process_block(&b1, &parent).unwrap();
        let snap2 = engine.process_block(&b2, &snap1).unwrap();
        assert!(snap2.state.current_batch.is_some());
    }

    #[test]
    fn empty_range_trigger_produces_zero_root() {
        // lastAnchoredBlock = 1000, trigger at N = 1500 with no RUIDs:
        // start = 1001, end = 1499, root = zero.
        let chain = Arc::new(MockChain::new());
        chain.add_genesis(MID_DAY);
        for _ in 0..1499 {
            chain.add_block(MID_DAY + 10, COINBASE, vec![]);
        }
        let trigger = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);
        assert_eq!(trigger.number, 1500);

        let (engine, _) = engine(chain.clone());
        let mut state = OtsState::new(true);
        state.last_anchored_block = 1000;
        let parent = Snapshot::new(1499, trigger.parent_hash, state);

        let snap = engine.process_block(&trigger, &parent).unwrap();
        let batch = snap.state.current_batch.as_ref().expect("batch triggered");
        assert_eq!(batch.start_block, 1001);
        assert_eq!(batch.end_block, 1499);
        assert_eq!(batch.root_hash, B256::ZERO);
        assert_eq!(batch.status, BatchStatus::Triggered);
    }

    #[test]
    fn trigger_skipped_when_nothing_to_anchor() {
        // Genesis then an immediate midnight crossing: range [1, 0] is empty.
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(MID_DAY);
        let b1 = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain);
        let parent = snapshots.genesis_snapshot(genesis.hash);
        let snap = engine.process_block(&b1, &parent).unwrap();
        assert!(snap.state.current_batch.is_none());
    }

    #[test]
    fn trigger_root_covers_claimed_ruids() {
        let ruid_a = B256::repeat_byte(0x11);
        let ruid_b = B256::repeat_byte(0x22);

        let chain = Arc::new(MockChain::new());
        chain.add_genesis(MID_DAY);
        chain.add_block(
            MID_DAY + 10,
            COINBASE,
            vec![Receipt::successful(vec![claim_log(ruid_a, 1, 0, 0)])],
        );
        chain.add_block(
            MID_DAY + 20,
            COINBASE,
            vec![Receipt::successful(vec![claim_log(ruid_b, 2, 0, 0)])],
        );
        let trigger = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);

        let (engine, _snapshots) = engine(chain.clone());
        let parent = Snapshot::new(
            trigger.number - 1,
            trigger.parent_hash,
            OtsState::new(true),
        );

        let snap = engine.process_block(&trigger, &parent).unwrap();
        let batch = snap.state.current_batch.as_ref().expect("batch triggered");

        let expected = RuidTree::from_ruids(vec![ruid_a, ruid_b]).root();
        assert_eq!(batch.root_hash, expected);
    }

    fn triggered_chain() -> (Arc<MockChain>, TransitionEngine, Snapshot, B256) {
        let ruid = B256::repeat_byte(0x11);
        let chain = Arc::new(MockChain::new());
        chain.add_genesis(MID_DAY);
        chain.add_block(
            MID_DAY + 10,
            COINBASE,
            vec![Receipt::successful(vec![claim_log(ruid, 1, 0, 0)])],
        );
        let trigger = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain.clone());
        let parent = snapshots.genesis_snapshot(B256::ZERO);
        let parent = Snapshot::new(trigger.number - 1, trigger.parent_hash, parent.state);
        let snap = engine.process_block(&trigger, &parent).unwrap();
        let root = snap.state.current_batch.as_ref().unwrap().root_hash;
        (chain, engine, snap, root)
    }

    #[test]
    fn submission_event_advances_to_submitted() {
        let (chain, engine, snap, root) = triggered_chain();
        let digest = B256::repeat_byte(0xaa);

        let block = chain.add_block(
            next_midnight(MID_DAY) + 15,
            COINBASE,
            vec![Receipt::successful(vec![ots_submitted_log(root, digest)])],
        );
        let next = engine.process_block(&block, &snap).unwrap();

        let batch = next.state.current_batch.as_ref().unwrap();
        assert_eq!(batch.status, BatchStatus::Submitted);
        assert_eq!(batch.ots_digest, Some(digest));
        assert_eq!(batch.submitted_at, Some(block.number));
        assert_eq!(batch.submitted_by, Some(COINBASE));
    }

    #[test]
    fn mismatched_root_submission_is_ignored() {
        let (chain, engine, snap, _root) = triggered_chain();

        let block = chain.add_block(
            next_midnight(MID_DAY) + 15,
            COINBASE,
            vec![Receipt::successful(vec![ots_submitted_log(
                B256::repeat_byte(0xff),
                B256::repeat_byte(0xaa),
            )])],
        );
        let next = engine.process_block(&block, &snap).unwrap();
        assert_eq!(
            next.state.current_batch.as_ref().unwrap().status,
            BatchStatus::Triggered
        );
    }

    #[test]
    fn failed_receipts_are_ignored() {
        let (chain, engine, snap, root) = triggered_chain();

        let mut receipt = Receipt::successful(vec![ots_submitted_log(root, B256::repeat_byte(0xaa))]);
        receipt.success = false;
        let block = chain.add_block(next_midnight(MID_DAY) + 15, COINBASE, vec![receipt]);

        let next = engine.process_block(&block, &snap).unwrap();
        assert_eq!(
            next.state.current_batch.as_ref().unwrap().status,
            BatchStatus::Triggered
        );
    }

    #[test]
    fn confirmation_and_anchor_complete_the_batch() {
        let (chain, engine, snap, root) = triggered_chain();
        let digest = B256::repeat_byte(0xaa);
        let btc_txid = B256::repeat_byte(0xbb);
        let base_ts = next_midnight(MID_DAY);

        let submitted = chain.add_block(
            base_ts + 15,
            COINBASE,
            vec![Receipt::successful(vec![ots_submitted_log(root, digest)])],
        );
        let snap = engine.process_block(&submitted, &snap).unwrap();

        let confirmed = chain.add_block(
            base_ts + 30,
            COINBASE,
            vec![Receipt::successful(vec![ots_confirmed_log(
                root,
                800_000,
                btc_txid,
                1_700_000_000,
            )])],
        );
        let snap = engine.process_block(&confirmed, &snap).unwrap();
        {
            let batch = snap.state.current_batch.as_ref().unwrap();
            assert_eq!(batch.status, BatchStatus::Confirmed);
            assert_eq!(batch.btc_block_height, Some(800_000));
            assert_eq!(batch.btc_tx_id.as_deref(), Some(hex::encode(btc_txid).as_str()));
            assert_eq!(batch.btc_timestamp, Some(1_700_000_000));
        }
        let end_block = snap.state.current_batch.as_ref().unwrap().end_block;

        let anchored = chain.add_block(
            base_ts + 45,
            COINBASE,
            vec![Receipt::successful(vec![anchored_log(
                root, 1, end_block, 800_000,
            )])],
        );
        let snap = engine.process_block(&anchored, &snap).unwrap();
        assert!(snap.state.current_batch.is_none());
        assert_eq!(snap.state.last_anchored_block, end_block);
    }

    #[test]
    fn disabled_state_passes_through() {
        let chain = Arc::new(MockChain::new());
        chain.add_genesis(MID_DAY);
        let b1 = chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);

        let snapshots = Arc::new(SnapshotManager::new(Arc::new(MemoryKvStore::new()), false));
        let engine = TransitionEngine::new(snapshots.clone(), chain);
        let parent = snapshots.genesis_snapshot(B256::ZERO);
        let parent = Snapshot::new(0, b1.parent_hash, parent.state);

        let snap = engine.process_block(&b1, &parent).unwrap();
        assert!(!snap.state.enabled);
        assert!(snap.state.current_batch.is_none());
    }

    #[test]
    fn rebuild_reproduces_identical_state() {
        let ruid = B256::repeat_byte(0x77);
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(MID_DAY);
        chain.add_block(
            MID_DAY + 10,
            COINBASE,
            vec![Receipt::successful(vec![claim_log(ruid, 1, 0, 0)])],
        );
        chain.add_block(next_midnight(MID_DAY) + 5, COINBASE, vec![]);
        chain.add_block(next_midnight(MID_DAY) + 20, COINBASE, vec![]);

        let (engine, snapshots) = engine(chain.clone());
        let genesis_snap = snapshots.genesis_snapshot(genesis.hash);

        let forward = engine.rebuild_state(&genesis_snap, 3).unwrap();
        let again = engine.rebuild_state(&genesis_snap, 3).unwrap();

        assert_eq!(forward, again);
        assert_eq!(
            forward.state.hash().unwrap(),
            again.state.hash().unwrap()
        );
        assert!(forward.state.current_batch.is_some());
    }

    #[test]
    fn rebuild_fails_on_missing_header() {
        let chain = Arc::new(MockChain::new());
        let genesis = chain.add_genesis(MID_DAY);

        let (engine, snapshots) = engine(chain);
        let genesis_snap = snapshots.genesis_snapshot(genesis.hash);
        assert!(matches!(
            engine.rebuild_state(&genesis_snap, 5),
            Err(ConsensusError::SnapshotNotFound)
        ));
    }
}
