//! Error types for the core crate.

use thiserror::Error;

/// Errors from resolving user-supplied time fragments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    /// The fragment was malformed or a field was out of range.
    #[error("invalid time format: {0}")]
    FormatInvalid(String),
}

/// Errors from reading or writing the timer snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot file I/O failed.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed.
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
