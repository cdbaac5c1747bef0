//! # spyglass-core
//!
//! Shared vocabulary for the Spyglass remote inspection SDK.
//!
//! This crate provides the types every other Spyglass crate depends on:
//!
//! - **[`SessionId`]**: validated UUID newtype; a value in hand is always well-formed
//! - **[`Environment`]**: prod/stage/qa/dev, and how each maps onto the connect host
//! - **[`InspectionEvent`]**: the envelope all SDK ↔ service traffic rides in
//! - **[`ConnectionRecord`] / [`SessionDescriptor`]**: connect-URL parsing and formatting,
//!   including session-start deep links
//! - **Constants**: wire strings (vendors, event kinds, query keys)
//! - **[`init_subscriber`]**: `tracing` subscriber setup for host apps

#![deny(unsafe_code)]

pub mod constants;
pub mod environment;
pub mod events;
pub mod ids;
pub mod logging;
pub mod uri;

pub use environment::Environment;
pub use events::InspectionEvent;
pub use ids::{InvalidSessionId, SessionId};
pub use logging::init_subscriber;
pub use uri::{ConnectionRecord, SessionDescriptor};
