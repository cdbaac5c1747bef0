//! Host application seams.

use serde_json::{Map, Value};

use spyglass_core::SessionId;

/// The host SDK's shared-state surface.
///
/// `publish_session` and `clear_session` are called with orchestrator
/// internals locked: implementations must return quickly and must not call
/// back into the orchestrator.
pub trait StateRegistry: Send + Sync {
    /// Organization id from host configuration, when known.
    fn org_id(&self) -> Option<String>;

    /// Announce the active session to the rest of the host SDK.
    fn publish_session(&self, session_id: &SessionId);

    /// Retract the announcement after the session ends.
    fn clear_session(&self);

    /// Current shared state of `owner`; XDM-shaped when `xdm` is set.
    fn shared_state(&self, owner: &str, xdm: bool) -> Option<Map<String, Value>>;
}

/// Facts about the host app that gate the quick-connect flow.
pub trait HostAppHandle: Send + Sync {
    /// Whether this is a debuggable build.
    fn is_debug_build(&self) -> bool;

    /// Whether the app currently has a foreground UI to present into.
    fn has_foreground_ui(&self) -> bool;
}
