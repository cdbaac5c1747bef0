//! # spyglass-session
//!
//! The Spyglass session layer: at most one live pairing with the remote
//! inspection service, plus the buffering that protects events queued before
//! that pairing exists.
//!
//! - **[`SessionOrchestrator`]**: owns the active session, the outbound
//!   buffer, and the idle countdown
//! - **[`Session`]**: one pairing attempt as an actor; a worker task owns
//!   the transport and drives `Idle → Authorizing → Connected → Disconnected`
//! - **Seams**: [`SessionTransport`]/[`TransportFactory`] for the wire,
//!   [`PresentationHost`] for the pairing UI, [`StateRegistry`] and
//!   [`HostAppHandle`] for the host app, [`InspectionPlugin`] for
//!   control-event consumers
//! - **[`OrchestratorConfig`]**: service domain, default environment, idle
//!   timeout

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod host;
pub mod orchestrator;
pub mod plugin;
pub mod presentation;
pub mod session;
pub mod status;
pub mod test_utils;
pub mod transport;

mod buffer;

pub use config::OrchestratorConfig;
pub use errors::SessionError;
pub use host::{HostAppHandle, StateRegistry};
pub use orchestrator::{SessionOrchestrator, UiOperationHandle};
pub use plugin::{InspectionPlugin, PluginRegistry};
pub use presentation::{PresentationHost, PresentationType};
pub use session::Session;
pub use status::{SessionStatus, SessionStatusListener};
pub use transport::{SessionTransport, TransportError, TransportFactory};
