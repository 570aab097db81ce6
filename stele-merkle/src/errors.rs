//! Error types for the Merkle engine.

use thiserror::Error;

/// Result type for Merkle operations.
pub type Result<T> = std::result::Result<T, MerkleError>;

/// Errors that can occur during tree and proof operations.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// The requested RUID is not a leaf of the tree.
    #[error("RUID not found in tree: {0}")]
    RuidNotFound(String),

    /// A serialized proof could not be decoded.
    #[error("invalid proof encoding: {0}")]
    InvalidProof(String),
}
