//! Session status and status listeners.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle of a single session.
///
/// Transitions run one way: `Idle → Authorizing → Connected → Disconnected`,
/// with `Authorizing → Disconnected` when the connect fails or the session is
/// torn down first. `Disconnected` is terminal; a new pairing is a new
/// session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, nothing started yet.
    Idle,
    /// Connect flow running, or waiting for a token.
    Authorizing,
    /// Live: events flow to the service.
    Connected,
    /// Over. Terminal.
    Disconnected,
}

impl SessionStatus {
    /// Whether this status ends the session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{name}")
    }
}

/// Observer of session status transitions.
///
/// Notifications arrive on the session's worker task, so every listener sees
/// the same total order. Implementations must not block.
pub trait SessionStatusListener: Send + Sync {
    /// A transition happened. Called once per change, in order.
    fn on_status_changed(&self, status: SessionStatus);
}

/// Set of status listeners, deduped by `Arc` pointer identity.
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn SessionStatusListener>>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self { listeners: Mutex::new(Vec::new()) }
    }

    /// Add a listener; re-registering the same `Arc` is a no-op.
    pub(crate) fn register(&self, listener: Arc<dyn SessionStatusListener>) {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    /// Remove a listener by pointer identity.
    pub(crate) fn unregister(&self, listener: &Arc<dyn SessionStatusListener>) {
        self.listeners.lock().retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Notify every listener. Snapshots first so a callback may register or
    /// unregister listeners without deadlocking.
    pub(crate) fn notify(&self, status: SessionStatus) {
        let snapshot: Vec<_> = self.listeners.lock().clone();
        for listener in snapshot {
            listener.on_status_changed(status);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}
