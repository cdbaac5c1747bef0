//! Wire-level constants shared across the session layer.

/// Vendor tag stamped on every outbound event this SDK produces.
pub const VENDOR_MOBILE: &str = "com.spyglass.mobile";

/// Vendor tag carried by control events from the inspection service.
pub const VENDOR_SERVICE: &str = "com.spyglass.service";

/// Default domain the connect host is built from
/// (`connect{infix}.{domain}`).
pub const DEFAULT_SERVICE_DOMAIN: &str = "observe.spyglass.net";

/// Path component of the session connect endpoint.
pub const CONNECT_PATH: &str = "client/v1";

/// Event kinds: the wire `type` field of an inspection event.
pub mod event_kind {
    /// Captured host-SDK traffic.
    pub const GENERIC: &str = "generic";
    /// Session control messages exchanged with the service.
    pub const CONTROL: &str = "control";
    /// Log lines forwarded to the service.
    pub const LOG: &str = "log";
    /// Binary attachment references.
    pub const BLOB: &str = "blob";
}

/// Query keys of a session-start deep link.
pub mod deep_link {
    /// Carries the session id to pair with.
    pub const SESSION_ID_KEY: &str = "adb_validation_sessionid";
    /// Optional environment selector (`stage`, `qa`, `dev`).
    pub const ENVIRONMENT_KEY: &str = "env";
}

/// Query keys of a connect URL (and so of the stored connection record).
pub mod connect {
    /// Session to join.
    pub const SESSION_ID: &str = "sessionId";
    /// Short-lived auth token (PIN or device-approval token).
    pub const TOKEN: &str = "token";
    /// Organization the session belongs to.
    pub const ORG_ID: &str = "orgId";
    /// Stable per-install client id.
    pub const CLIENT_ID: &str = "clientId";
}

/// Control event types the session layer itself understands.
pub mod control_type {
    /// Matches every control type when used as a plugin registration.
    pub const WILDCARD: &str = "wildcard";
    /// Service-initiated session teardown.
    pub const DISCONNECT: &str = "disconnect";
}
