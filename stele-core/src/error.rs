//! Error types for core value parsing.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling core chain values.
#[derive(Debug, Error)]
pub enum Error {
    /// A 32-byte hash could not be parsed from its textual form.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// An event log did not match the expected shape.
    #[error("invalid event log: {0}")]
    InvalidLog(String),

    /// A value failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHash(e.to_string())
    }
}
