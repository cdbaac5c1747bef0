//! Session layer error types.

use thiserror::Error;

use spyglass_core::InvalidSessionId;

/// Errors reported by session creation.
///
/// The rest of the public surface degrades to logged no-ops; only
/// [`create_session`](crate::SessionOrchestrator::create_session) hands a
/// failure back to its caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The raw session id is empty or whitespace-only.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// A session is already active; terminate it first.
    #[error("a session is already active")]
    SessionAlreadyActive,
}

impl SessionError {
    /// Error category string for logs.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::InvalidSessionId(_) => "invalid_session_id",
            Self::SessionAlreadyActive => "already_active",
        }
    }
}

impl From<InvalidSessionId> for SessionError {
    fn from(err: InvalidSessionId) -> Self {
        Self::InvalidSessionId(err.0)
    }
}
