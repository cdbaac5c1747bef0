//! Connection persistence seam.

use crate::errors::StoreError;

/// Persistence for the connection record and the per-install client id.
///
/// The session layer treats the store as best-effort: read failures look
/// like "nothing stored" and write failures are logged at the call site, so
/// a broken store degrades reconnect persistence without touching live
/// sessions.
pub trait ConnectionStore: Send + Sync {
    /// The connect URL of the last successfully connected session, if any.
    fn stored_connection_url(&self) -> Option<String>;

    /// Persist the connect URL of a session that just connected.
    fn save_connection_url(&self, url: &str) -> Result<(), StoreError>;

    /// Forget the stored connect URL. Only an explicit user disconnect
    /// calls this; idle shutdown and connect failures keep the record.
    fn clear_connection_url(&self) -> Result<(), StoreError>;

    /// Stable per-install client id; generated and persisted on first use.
    fn client_id(&self) -> String;
}
