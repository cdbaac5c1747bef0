//! # spyglass-store
//!
//! Persistence for the Spyglass session layer: the connection record of the
//! last successfully connected session (so an app relaunch can reconnect
//! without re-pairing) and the stable per-install client id.
//!
//! - **[`ConnectionStore`]**: the persistence seam the session layer talks to
//! - **[`FileConnectionStore`]**: JSON file under `~/.spyglass` with 0o600
//!   permissions; corrupt files degrade to "nothing stored"

#![deny(unsafe_code)]

pub mod errors;
pub mod file_store;
pub mod store;

pub use errors::StoreError;
pub use file_store::FileConnectionStore;
pub use store::ConnectionStore;
