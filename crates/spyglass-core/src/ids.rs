//! Session identifier.
//!
//! A [`SessionId`] is an opaque non-empty string, kept verbatim. The service
//! issues ids in whatever shape it likes; stored connection records and
//! quick-connect approvals carry them as-is. Only deep links demand UUID
//! shape, and that check lives at the deep-link parser in
//! [`uri`](crate::uri). Construction goes through [`SessionId::parse`], so
//! any value in hand is at least non-blank.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error returned when a string is not a usable session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid session id: {0:?}")]
pub struct InvalidSessionId(pub String);

/// Session identifier: any non-empty string, kept verbatim.
///
/// Serializes as a plain string. There is deliberately no `Deserialize`
/// impl: every inbound id goes through [`SessionId::parse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Accept a raw session id, rejecting empty and whitespace-only input.
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionId> {
        if raw.trim().is_empty() {
            return Err(InvalidSessionId(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
