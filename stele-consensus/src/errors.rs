//! Error types for the consensus layer.

use thiserror::Error;

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Errors raised while advancing or querying OTS consensus state.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The state observed does not admit the requested operation.
    #[error("invalid OTS state: {0}")]
    InvalidState(String),

    /// The requested status transition is not in the transition relation.
    #[error("invalid state transition")]
    InvalidTransition,

    /// A batch is already active; a new one cannot be triggered.
    #[error("batch already triggered")]
    AlreadyTriggered,

    /// No batch in `Triggered` status to mark submitted.
    #[error("batch not yet triggered")]
    NotTriggered,

    /// No batch in `Submitted` status to mark confirmed.
    #[error("batch not yet submitted")]
    NotSubmitted,

    /// No batch in `Confirmed` status to mark anchored.
    #[error("batch not yet confirmed")]
    NotConfirmed,

    /// No snapshot exists for the requested block.
    #[error("OTS snapshot not found")]
    SnapshotNotFound,

    /// The module configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OpenTimestamps client failed.
    #[error("OTS client error: {0}")]
    Client(String),

    /// A snapshot or state value failed to encode or decode.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The durable store failed.
    #[error(transparent)]
    Storage(#[from] stele_storage::StorageError),

    /// A system transaction failed structural validation.
    #[error(transparent)]
    Systx(#[from] stele_systx::SystxError),
}

impl From<serde_json::Error> for ConsensusError {
    fn from(e: serde_json::Error) -> Self {
        ConsensusError::Serialization(e.to_string())
    }
}
