//! Presentation seam for the pairing UI.

use crate::orchestrator::UiOperationHandle;

/// Which authorization flow a session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentationType {
    /// Developer types the 4-digit PIN shown by the service UI.
    Pin,
    /// Device approval: the service pushes a session id and token after the
    /// developer approves this device.
    QuickConnect,
}

/// Host-rendered pairing UI.
///
/// Rendering is entirely the host's concern; the session layer only asks for
/// a flow to appear or go away, and receives the outcome through
/// [`UiOperationHandle`] callbacks. Both methods are invoked with no
/// session-layer locks held, so an implementation may call back into the
/// orchestrator or the operation handle from inside them, as a sheet whose
/// close animation reports cancellation does.
pub trait PresentationHost: Send + Sync {
    /// Show the given flow. Returns `false` when the UI cannot be shown,
    /// for example with no foreground activity to attach to.
    fn launch(&self, flow: PresentationType, operations: UiOperationHandle) -> bool;

    /// Hide the given flow if it is showing.
    fn dismiss(&self, flow: PresentationType);
}
