//! Core types for Stele, the Bitcoin-anchored timestamping consensus module.
//!
//! This crate defines the host-chain-facing value types (headers, receipts,
//! logs, transactions) the consensus layer consumes, the `CopyrightClaimed`
//! event model with its deterministic sort key, and the registry contract
//! constants shared by every other crate in the workspace.
//!
//! Nothing here talks to a live chain: the types are plain values handed in
//! by the host through the accessor traits in `stele-consensus`.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod event;
pub mod types;

pub use error::{Error, Result};
pub use event::{
    ClaimEvent, SortKey, ANCHORED_TOPIC, CLAIM_TOPIC, OTS_CONFIRMED_TOPIC, OTS_SUBMITTED_TOPIC,
    REGISTRY_ADDRESS,
};
pub use types::{Header, Log, Receipt, Transaction};
