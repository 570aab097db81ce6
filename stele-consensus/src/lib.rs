//! Bitcoin-anchoring timestamping consensus for a proof-of-authority chain.
//!
//! The registry contract emits one `CopyrightClaimed` event per claim. Once a
//! day, at the first block whose timestamp crosses 00:00 UTC, the claims
//! observed since the last anchored batch are reduced to a Merkle root and
//! the batch lifecycle begins. Validators drive it forward with three system
//! transactions — `otsSubmitted`, `otsConfirmed`, `anchor` — whose events in
//! turn advance every node's state machine:
//!
//! ```text
//! None -> Triggered -> Submitted -> Confirmed -> Anchored -> None
//! ```
//!
//! Everything is derived from block contents: header timestamps decide
//! triggers, event logs decide the remaining transitions. Two honest nodes
//! processing the same blocks hold byte-identical state, which is what lets
//! the root hash act as a consensus datum.
//!
//! # Architecture
//!
//! ```text
//! header + receipts ──> TransitionEngine ──> Snapshot ──> SnapshotManager
//!                                                          (LRU + RocksDB)
//! block assembly:  state ──> ConsensusManager ──> OtsClient? ──> systx codec
//! block validation: tx + parent snapshot ──> ConsensusManager ──> accept/reject
//! ```
//!
//! The host chain, the OpenTimestamps calendar and durable storage are
//! reached only through the [`ChainReader`], [`OtsClient`] and
//! `stele_storage::KvStore` seams, so the whole module runs against
//! in-memory fakes in tests.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod chain;
pub mod client;
pub mod config;
pub mod errors;
pub mod manager;
pub mod mock;
pub mod snapshot;
pub mod state;
pub mod transition;
pub mod verify;

#[cfg(test)]
mod proptest;

pub use chain::ChainReader;
pub use client::{BtcConfirmation, OtsClient, StampReceipt};
pub use config::{OtsConfig, DEFAULT_SYSTEM_TX_GAS_LIMIT};
pub use errors::{ConsensusError, Result};
pub use manager::{BatchSummary, ConsensusManager, OtsStats};
pub use snapshot::{Snapshot, SnapshotManager, SNAPSHOT_CACHE_SIZE, SNAPSHOT_PERSIST_INTERVAL};
pub use state::{BatchState, BatchStatus, OtsState};
pub use transition::{collect_ruids, TransitionEngine, TRIGGER_HOUR_UTC};
pub use verify::{VerifyApi, VerifyResult};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::chain::ChainReader;
    pub use crate::client::{BtcConfirmation, OtsClient};
    pub use crate::config::OtsConfig;
    pub use crate::errors::{ConsensusError, Result};
    pub use crate::manager::ConsensusManager;
    pub use crate::snapshot::{Snapshot, SnapshotManager};
    pub use crate::state::{BatchState, BatchStatus, OtsState};
    pub use crate::transition::TransitionEngine;
}
