//! Error types for system-transaction handling.

use thiserror::Error;

/// Result type for system-transaction operations.
pub type Result<T> = std::result::Result<T, SystxError>;

/// Errors raised by the codec, builder and validator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SystxError {
    /// The transaction carries a non-zero gas price.
    #[error("not a system transaction (gas price != 0)")]
    NotSystemTx,

    /// The transaction sender is not the block coinbase.
    #[error("system transaction sender is not the coinbase")]
    InvalidSender,

    /// The transaction recipient is not the registry contract.
    #[error("invalid recipient address")]
    InvalidRecipient,

    /// Calldata has the wrong length or layout for its selector.
    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),

    /// The selector does not match any known system call.
    #[error("unrecognized system transaction selector")]
    InvalidOtsTx,

    /// A candidate batch is missing required data.
    #[error("invalid candidate batch: {0}")]
    InvalidCandidate(String),

    /// The candidate root does not match the recomputed root.
    #[error("root hash mismatch during candidate validation")]
    RootMismatch,
}
