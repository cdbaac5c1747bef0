//! Events on the host SDK's internal bus, as the extension sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Event types the inspection extension reacts to.
pub mod event_type {
    /// Host event-hub lifecycle traffic.
    pub const HUB: &str = "hub";
    /// Events addressed to the inspection extension itself.
    pub const INSPECTION: &str = "inspection";
}

/// Event sources the inspection extension reacts to.
pub mod event_source {
    /// Shared-state change notifications.
    pub const SHARED_STATE: &str = "sharedstate";
    /// Session start and quick-connect requests.
    pub const REQUEST_CONTENT: &str = "requestcontent";
}

/// Data keys inside the events the extension consumes.
pub mod data_key {
    /// Deep link that starts a PIN session.
    pub const START_SESSION_URL: &str = "startSessionURL";
    /// Boolean flag requesting the quick-connect flow.
    pub const QUICK_CONNECT: &str = "quickConnect";
    /// Owner name inside shared-state change events.
    pub const STATE_OWNER: &str = "stateowner";
}

/// Event names distinguishing shared-state shapes.
pub mod event_name {
    /// Regular shared-state change.
    pub const SHARED_STATE_CHANGE: &str = "Shared state change";
    /// XDM-shaped shared-state change.
    pub const XDM_SHARED_STATE_CHANGE: &str = "Shared state change (XDM)";
}

/// An event on the host SDK's internal bus.
///
/// Type and source are matched case-insensitively everywhere the extension
/// inspects them; the stored values keep whatever casing the host used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkEvent {
    /// Human-readable event name.
    pub name: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event source.
    pub source: String,
    /// Unique id.
    pub uid: String,
    /// Id of the event this one responds to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uid: Option<String>,
    /// Free-form event data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl SdkEvent {
    /// New event with a fresh uid and no data.
    #[must_use]
    pub fn new(name: &str, event_type: &str, source: &str) -> Self {
        Self {
            name: name.to_owned(),
            event_type: event_type.to_owned(),
            source: source.to_owned(),
            uid: Uuid::now_v7().to_string(),
            parent_uid: None,
            data: None,
        }
    }

    /// Attach data.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a parent uid.
    #[must_use]
    pub fn with_parent(mut self, parent_uid: &str) -> Self {
        self.parent_uid = Some(parent_uid.to_owned());
        self
    }

    /// True for shared-state change notifications (`hub` / `sharedstate`).
    #[must_use]
    pub fn is_shared_state_change(&self) -> bool {
        self.event_type.eq_ignore_ascii_case(event_type::HUB)
            && self.source.eq_ignore_ascii_case(event_source::SHARED_STATE)
    }

    /// True when the name marks the XDM shared-state shape.
    #[must_use]
    pub fn is_xdm_shared_state(&self) -> bool {
        self.name == event_name::XDM_SHARED_STATE_CHANGE
    }

    /// Non-empty string value under `key` in the event data.
    #[must_use]
    pub fn data_string(&self, key: &str) -> Option<&str> {
        self.data
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|value| !value.is_empty())
    }

    /// Boolean value under `key` in the event data; missing reads as false.
    #[must_use]
    pub fn data_bool(&self, key: &str) -> bool {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
