//! Transport seam between the session layer and the wire.
//!
//! The socket protocol itself lives outside this crate; the session layer
//! only needs connect/disconnect/send plus an inbound channel for control
//! events. A [`TransportFactory`] is handed the session descriptor and the
//! inbound sender when a session is created.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use spyglass_core::{InspectionEvent, SessionDescriptor};

/// Transport failures surfaced to the session worker.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach or authorize with the service.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection dropped or refused a send.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// One session's wire connection.
///
/// Contracts the session worker relies on:
/// - `connect` may be raced against cancellation and its future dropped;
///   implementations must tolerate that and clean up on `disconnect`.
/// - `disconnect` is idempotent and safe in any state.
/// - Remote closure surfaces as a `send` error or as an inbound `disconnect`
///   control event, never as a dropped inbound sender.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open the connection to the given connect URL.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Close the connection. Best effort; never fails.
    async fn disconnect(&self);

    /// Send one outbound event.
    async fn send(&self, event: &InspectionEvent) -> Result<(), TransportError>;

    /// Hint that the host app moved between foreground and background.
    fn host_visibility_changed(&self, _foreground: bool) {}
}

/// Creates the transport for a new session.
pub trait TransportFactory: Send + Sync {
    /// Build a transport for `descriptor`. Inbound control events from the
    /// service go into `inbound`.
    ///
    /// Runs while the session layer holds its internal lock: build and
    /// return, never call back into the orchestrator from here. Opening the
    /// actual connection belongs in [`SessionTransport::connect`].
    fn create_transport(
        &self,
        descriptor: &SessionDescriptor,
        inbound: mpsc::UnboundedSender<InspectionEvent>,
    ) -> Arc<dyn SessionTransport>;
}
