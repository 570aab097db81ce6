//! Consensus manager: the host chain's entry point into OTS state.
//!
//! The manager owns configuration, the snapshot manager, the transition
//! engine and the system-transaction codec. The host calls in at three
//! points: block finalization (`process_block`), block assembly
//! (`get_system_transactions`) and block validation
//! (`validate_ots_system_tx`). Competing validators may all produce
//! candidates for the same step; the rootHash-match invariant means only one
//! class of payload is valid per status, so the first landed transaction
//! advances the state and later duplicates fail validation and are rejected.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stele_core::{Header, Transaction};
use stele_merkle::RuidTree;
use stele_storage::KvStore;
use stele_systx::{
    btc_txid_to_hash, AnchorCalldata, Builder, CandidateBatch, OtsConfirmedCall, OtsSubmittedCall,
    SystxKind, Validator,
};

use crate::chain::ChainReader;
use crate::client::OtsClient;
use crate::config::OtsConfig;
use crate::errors::{ConsensusError, Result};
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::state::{BatchState, BatchStatus, OtsState};
use crate::transition::{collect_ruids, TransitionEngine};

/// Read-only statistics for RPC surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtsStats {
    /// Whether OTS is enabled.
    pub enabled: bool,
    /// End block of the most recently anchored batch, if a snapshot resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_anchored_block: Option<u64>,
    /// Summary of the batch in flight, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<BatchSummary>,
    /// Snapshot cache occupancy.
    pub cache_size: usize,
    /// Snapshot cache capacity.
    pub cache_capacity: usize,
}

/// Compact batch view exposed over RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// First block of the batch range.
    pub start_block: u64,
    /// Last block of the batch range.
    pub end_block: u64,
    /// Current status.
    pub status: BatchStatus,
    /// Batch Merkle root.
    pub root_hash: B256,
    /// Block that triggered the batch.
    pub trigger_block: u64,
}

struct ManagerInner {
    chain: Option<Arc<dyn ChainReader>>,
    engine: Option<TransitionEngine>,
    client: Option<Arc<dyn OtsClient>>,
}

/// Orchestrates OTS consensus for the host chain.
pub struct ConsensusManager {
    config: OtsConfig,
    snapshots: Arc<SnapshotManager>,
    builder: Builder,
    validator: Validator,
    inner: RwLock<ManagerInner>,
}

impl ConsensusManager {
    /// Create a manager over the given durable store.
    pub fn new(store: Arc<dyn KvStore>, config: OtsConfig) -> Result<Self> {
        config.validate()?;

        let snapshots = Arc::new(SnapshotManager::new(store, config.enabled));
        Ok(Self {
            builder: Builder::new(config.contract_address),
            validator: Validator::new(config.contract_address),
            snapshots,
            config,
            inner: RwLock::new(ManagerInner {
                chain: None,
                engine: None,
                client: None,
            }),
        })
    }

    /// Install the chain accessors. Must be called before block processing.
    pub fn set_chain_reader(&self, chain: Arc<dyn ChainReader>) {
        let mut inner = self.inner.write();
        inner.engine = Some(TransitionEngine::new(self.snapshots.clone(), chain.clone()));
        inner.chain = Some(chain);
    }

    /// Install the optional OpenTimestamps client.
    pub fn set_ots_client(&self, client: Arc<dyn OtsClient>) {
        self.inner.write().client = Some(client);
    }

    /// Whether OTS is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The active configuration.
    pub fn config(&self) -> &OtsConfig {
        &self.config
    }

    /// The snapshot for a block hash.
    pub fn snapshot(&self, block_hash: B256) -> Result<Snapshot> {
        self.snapshots.get_snapshot(block_hash)
    }

    /// The OTS state at a block hash.
    pub fn current_state(&self, block_hash: B256) -> Result<OtsState> {
        Ok(self.snapshots.get_snapshot(block_hash)?.state)
    }

    /// Process a block during finalization and return the child snapshot.
    ///
    /// Returns `None` when OTS is disabled or accessors are not installed.
    /// The parent snapshot must exist, except for block 1 which starts from
    /// the genesis snapshot.
    pub fn process_block(&self, header: &Header, parent_hash: B256) -> Result<Option<Snapshot>> {
        let inner = self.inner.write();

        if !self.config.enabled {
            return Ok(None);
        }
        let Some(engine) = inner.engine.as_ref() else {
            return Ok(None);
        };

        let parent = match self.snapshots.get_snapshot(parent_hash) {
            Ok(snap) => snap,
            Err(_) if header.number == 1 => self.snapshots.genesis_snapshot(parent_hash),
            Err(e) => return Err(e),
        };

        engine.process_block(header, &parent).map(Some)
    }

    /// Produce candidate system transactions during block assembly.
    ///
    /// Returning no transactions is normal: the client may be absent or
    /// unreachable, or Bitcoin confirmation still outstanding.
    pub fn get_system_transactions(
        &self,
        header: &Header,
        parent_hash: B256,
        coinbase: Address,
    ) -> Result<Vec<Transaction>> {
        let inner = self.inner.read();

        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let snap = match self.snapshots.get_snapshot(parent_hash) {
            Ok(snap) => snap,
            Err(e) => {
                debug!(block = header.number, error = %e, "no parent snapshot for assembly");
                return Ok(Vec::new());
            }
        };
        let Some(batch) = snap.state.current_batch.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(chain) = inner.chain.as_ref() else {
            return Ok(Vec::new());
        };

        let nonce = chain.nonce(coinbase);
        let mut txs = Vec::new();

        match batch.status {
            BatchStatus::Triggered => {
                if let Some(client) = inner.client.as_ref() {
                    match self.try_build_submitted_tx(client.as_ref(), batch, nonce) {
                        Ok(Some(tx)) => txs.push(tx),
                        Ok(None) => {}
                        Err(e) => {
                            debug!(block = header.number, error = %e, "failed to build otsSubmitted tx")
                        }
                    }
                }
            }
            BatchStatus::Submitted => {
                if let Some(client) = inner.client.as_ref() {
                    match self.try_build_confirmed_tx(client.as_ref(), batch, nonce) {
                        Ok(Some(tx)) => txs.push(tx),
                        Ok(None) => {}
                        Err(e) => {
                            debug!(block = header.number, error = %e, "failed to build otsConfirmed tx")
                        }
                    }
                }
            }
            BatchStatus::Confirmed => {
                match self.build_anchor_tx(chain.as_ref(), batch, nonce) {
                    Ok(tx) => txs.push(tx),
                    Err(e) => debug!(block = header.number, error = %e, "failed to build anchor tx"),
                }
            }
            _ => {}
        }

        Ok(txs)
    }

    /// Submit the root to the calendar and build the `otsSubmitted` candidate.
    fn try_build_submitted_tx(
        &self,
        client: &dyn OtsClient,
        batch: &BatchState,
        nonce: u64,
    ) -> Result<Option<Transaction>> {
        let receipt = client.stamp(batch.root_hash)?;
        let call = OtsSubmittedCall {
            root_hash: batch.root_hash,
            ots_digest: receipt.digest,
        };
        Ok(Some(self.builder.build_ots_submitted_tx(
            &call,
            nonce,
            self.config.system_tx_gas_limit,
        )))
    }

    /// Poll for confirmation and build the `otsConfirmed` candidate.
    fn try_build_confirmed_tx(
        &self,
        client: &dyn OtsClient,
        batch: &BatchState,
        nonce: u64,
    ) -> Result<Option<Transaction>> {
        let digest = batch.ots_digest.ok_or_else(|| {
            ConsensusError::InvalidState("submitted batch is missing its calendar digest".into())
        })?;

        let result = client.check_confirmation(digest)?;
        if !result.confirmed {
            return Ok(None);
        }

        let call = OtsConfirmedCall {
            root_hash: batch.root_hash,
            btc_block_height: result.btc_block_height,
            btc_tx_id: btc_txid_to_hash(&result.btc_tx_id)?,
            btc_timestamp: result.btc_timestamp,
        };
        Ok(Some(self.builder.build_ots_confirmed_tx(
            &call,
            nonce,
            self.config.system_tx_gas_limit,
        )))
    }

    /// Collect the batch RUIDs, re-verify the root, and build the `anchor`
    /// candidate. A root mismatch drops the candidate.
    fn build_anchor_tx(
        &self,
        chain: &dyn ChainReader,
        batch: &BatchState,
        nonce: u64,
    ) -> Result<Transaction> {
        let missing = |field: &str| {
            ConsensusError::InvalidState(format!("confirmed batch is missing {field}"))
        };
        let btc_block_height = batch.btc_block_height.ok_or_else(|| missing("BTC height"))?;
        let btc_tx_id = batch.btc_tx_id.clone().ok_or_else(|| missing("BTC txid"))?;
        let btc_timestamp = batch.btc_timestamp.ok_or_else(|| missing("BTC timestamp"))?;

        let ruids = collect_ruids(chain, batch.start_block, batch.end_block);
        let computed_root = RuidTree::from_ruids(ruids.clone()).root();

        let mut candidate = CandidateBatch {
            root_hash: batch.root_hash,
            start_block: batch.start_block,
            end_block: batch.end_block,
            event_ruids: ruids,
            btc_block_height,
            btc_tx_id,
            btc_timestamp,
            validated: false,
        };
        self.builder.validate_candidate(&mut candidate, computed_root)?;

        Ok(self
            .builder
            .build_anchor_tx(&candidate, nonce, self.config.system_tx_gas_limit)?)
    }

    /// Validate a system transaction against the parent snapshot.
    ///
    /// Transactions without a recognized selector are not ours and pass
    /// untouched. For recognized selectors: the envelope must be well formed,
    /// the parent snapshot must exist, the batch status must match the
    /// selector's expected stage, the declared root must equal the batch
    /// root, and an anchor must additionally match the batch range. Any
    /// violation is an error and the host rejects the block.
    pub fn validate_ots_system_tx(&self, tx: &Transaction, parent_hash: B256) -> Result<()> {
        let _inner = self.inner.read();

        if !self.config.enabled {
            return Ok(());
        }
        let Some(kind) = SystxKind::from_calldata(&tx.data) else {
            return Ok(());
        };

        self.validator.validate(tx)?;

        let snap = self.snapshots.get_snapshot(parent_hash)?;
        let batch = snap
            .state
            .current_batch
            .as_ref()
            .ok_or(ConsensusError::InvalidTransition)?;

        let root_mismatch =
            || ConsensusError::InvalidState("declared root does not match batch root".into());

        match kind {
            SystxKind::OtsSubmitted => {
                if batch.status != BatchStatus::Triggered {
                    return Err(ConsensusError::InvalidTransition);
                }
                let call = OtsSubmittedCall::decode(&tx.data)?;
                if call.root_hash != batch.root_hash {
                    return Err(root_mismatch());
                }
            }
            SystxKind::OtsConfirmed => {
                if batch.status != BatchStatus::Submitted {
                    return Err(ConsensusError::InvalidTransition);
                }
                let call = OtsConfirmedCall::decode(&tx.data)?;
                if call.root_hash != batch.root_hash {
                    return Err(root_mismatch());
                }
            }
            SystxKind::Anchor => {
                if batch.status != BatchStatus::Confirmed {
                    return Err(ConsensusError::InvalidTransition);
                }
                let call = AnchorCalldata::decode(&tx.data)?;
                if call.batch_root != batch.root_hash {
                    return Err(root_mismatch());
                }
                if call.start_block != batch.start_block || call.end_block != batch.end_block {
                    return Err(ConsensusError::InvalidState(format!(
                        "anchor range [{}, {}] does not match batch [{}, {}]",
                        call.start_block, call.end_block, batch.start_block, batch.end_block
                    )));
                }
            }
        }

        Ok(())
    }

    /// Rebuild OTS state from chain data up to `to_block` and persist the
    /// result. Used on restart and after deep reorgs.
    pub fn rebuild_from_chain(&self, from_block: u64, to_block: u64) -> Result<()> {
        let inner = self.inner.write();

        let (Some(engine), Some(chain)) = (inner.engine.as_ref(), inner.chain.as_ref()) else {
            return Err(ConsensusError::InvalidState(
                "chain accessors not installed".into(),
            ));
        };

        let start = self
            .snapshots
            .find_nearest_snapshot(from_block, |n| chain.header_by_number(n).map(|h| h.hash));

        info!(
            from = start.number,
            to = to_block,
            "rebuilding OTS state from chain"
        );

        let rebuilt = engine.rebuild_state(&start, to_block)?;
        self.snapshots.force_store(&rebuilt)?;
        Ok(())
    }

    /// The batch state at a block hash, for RPC queries.
    pub fn batch_state(&self, block_hash: B256) -> Option<BatchState> {
        self.snapshots
            .get_snapshot(block_hash)
            .ok()
            .and_then(|snap| snap.state.current_batch)
    }

    /// Consensus statistics at a block hash, for RPC queries.
    pub fn stats(&self, block_hash: B256) -> OtsStats {
        let (cache_size, cache_capacity) = self.snapshots.cache_stats();
        let mut stats = OtsStats {
            enabled: self.config.enabled,
            last_anchored_block: None,
            current_batch: None,
            cache_size,
            cache_capacity,
        };

        if let Ok(snap) = self.snapshots.get_snapshot(block_hash) {
            stats.last_anchored_block = Some(snap.state.last_anchored_block);
            stats.current_batch = snap.state.current_batch.map(|b| BatchSummary {
                start_block: b.start_block,
                end_block: b.end_block,
                status: b.status,
                root_hash: b.root_hash,
                trigger_block: b.trigger_block,
            });
        }
        stats
    }
}
