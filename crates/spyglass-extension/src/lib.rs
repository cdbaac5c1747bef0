//! # spyglass-extension
//!
//! The SDK-facing Spyglass facade. The host SDK registers one
//! [`InspectionExtension`], points its wildcard listener at
//! [`handle_wildcard_event`](InspectionExtension::handle_wildcard_event) and
//! its request listener at
//! [`handle_session_request`](InspectionExtension::handle_session_request),
//! and everything else (pairing, buffering, shared-state enrichment) runs
//! behind the orchestrator.

#![deny(unsafe_code)]

pub mod extension;
pub mod sdk_event;

pub use extension::InspectionExtension;
pub use sdk_event::SdkEvent;

pub use spyglass_core::init_subscriber;
