//! System transactions for Stele anchoring consensus.
//!
//! Validators synchronize the batch state machine through three calls to the
//! registry contract, embedded as zero-gas-price "system transactions":
//!
//! | call | advances |
//! |---|---|
//! | `otsSubmitted(bytes32,bytes32)` | `Triggered -> Submitted` |
//! | `otsConfirmed(bytes32,uint64,bytes32,uint64)` | `Submitted -> Confirmed` |
//! | `anchor(uint64,uint64,bytes32,bytes32,uint64)` | `Confirmed -> Anchored` |
//!
//! All three use fixed 32-byte parameter slots, so the codec is a handful of
//! fixed-layout encoders and decoders; no dynamic ABI machinery is involved.
//! The builder produces candidate transactions during block assembly and the
//! validator screens transactions that claim to be system transactions during
//! block processing.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod builder;
pub mod codec;
pub mod errors;
pub mod validator;

#[cfg(test)]
mod proptest;

pub use builder::{Builder, CandidateBatch};
pub use codec::{
    btc_txid_to_hash, AnchorCalldata, OtsConfirmedCall, OtsSubmittedCall, SystxKind,
    ANCHOR_CALLDATA_LEN, ANCHOR_SELECTOR, OTS_CONFIRMED_CALLDATA_LEN, OTS_CONFIRMED_SELECTOR,
    OTS_SUBMITTED_CALLDATA_LEN, OTS_SUBMITTED_SELECTOR,
};
pub use errors::{Result, SystxError};
pub use validator::Validator;
