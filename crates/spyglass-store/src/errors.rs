//! Store error types.

use thiserror::Error;

/// Errors from connection persistence.
///
/// Callers in the session layer log these and carry on; a broken store
/// never breaks a live session.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
