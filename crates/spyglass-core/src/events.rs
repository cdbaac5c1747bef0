//! Inspection event envelope.
//!
//! Every piece of traffic between the SDK and the inspection service rides
//! in an [`InspectionEvent`]: captured host-SDK events wrapped as `generic`,
//! session control messages as `control`. Outbound events are numbered by a
//! process-wide counter so the service can order events that share a
//! wall-clock timestamp.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{VENDOR_MOBILE, event_kind};

/// Process-wide event sequence. Starts at 1 for the first event.
static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_event_number() -> u64 {
    EVENT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

/// A single event exchanged with the inspection service.
///
/// Wire form (camelCase): `eventId`, `vendor`, `type`, `payload`,
/// `timestamp`, `eventNumber`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionEvent {
    /// Unique event id (fresh UUID per event).
    pub event_id: String,
    /// Reverse-DNS origin tag.
    pub vendor: String,
    /// Event kind (`generic`, `control`, `log`, `blob`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Event body.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Wall-clock milliseconds at construction.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Process-wide sequence number (orders same-timestamp events).
    #[serde(default)]
    pub event_number: u64,
}

impl InspectionEvent {
    /// Build an outbound event of the given kind with this SDK's vendor tag.
    #[must_use]
    pub fn new(kind: &str, payload: Map<String, Value>) -> Self {
        Self::with_vendor(VENDOR_MOBILE, kind, payload)
    }

    /// Build an event carrying an explicit vendor tag.
    #[must_use]
    pub fn with_vendor(vendor: &str, kind: &str, payload: Map<String, Value>) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            vendor: vendor.to_owned(),
            kind: kind.to_owned(),
            payload,
            timestamp_ms: Utc::now().timestamp_millis(),
            event_number: next_event_number(),
        }
    }

    /// Shorthand for a `generic` outbound event.
    #[must_use]
    pub fn generic(payload: Map<String, Value>) -> Self {
        Self::new(event_kind::GENERIC, payload)
    }

    /// True for session control events.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.kind == event_kind::CONTROL
    }

    /// Control routing discriminator: the payload `type` value, if present.
    #[must_use]
    pub fn control_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }
}
