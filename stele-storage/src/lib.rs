//! Durable storage for the Stele timestamping module.
//!
//! Two layers:
//!
//! - a flat [`KvStore`] abstraction with RocksDB and in-memory
//!   implementations; the consensus snapshot manager persists its snapshots
//!   through this, keyed under its own prefix;
//! - a typed [`BatchRecordStore`] holding batch metadata and submission
//!   attempts with RUID and digest indexes, backing the RPC verification
//!   surface.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod batch;
pub mod errors;
pub mod kv;
pub mod rocks;

pub use batch::{AttemptRecord, AttemptStatus, BatchRecord, BatchRecordStore};
pub use errors::{Result, StorageError};
pub use kv::{KvStore, MemoryKvStore};
pub use rocks::RocksKvStore;
