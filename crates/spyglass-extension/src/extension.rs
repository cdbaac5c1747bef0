//! The inspection extension, the SDK-facing facade.
//!
//! Sits on the host SDK's event bus: wraps wildcard traffic into inspection
//! events, enriches shared-state changes with the actual state content, and
//! turns session-request commands into orchestrator calls. Nothing here
//! throws into the host: bad input is logged and dropped.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use spyglass_core::InspectionEvent;
use spyglass_session::{SessionOrchestrator, StateRegistry};

use crate::sdk_event::{SdkEvent, data_key};

/// Payload keys of a wrapped SDK event.
mod payload_key {
    /// Original event name.
    pub const EVENT_NAME: &str = "eventName";
    /// Original event type, lowercased.
    pub const EVENT_TYPE: &str = "eventType";
    /// Original event source, lowercased.
    pub const EVENT_SOURCE: &str = "eventSource";
    /// Original event uid.
    pub const EVENT_UID: &str = "eventUid";
    /// Parent event uid, when present.
    pub const EVENT_PARENT_UID: &str = "eventParentUid";
    /// Original event data, when present.
    pub const EVENT_DATA: &str = "eventData";
    /// Enrichment attached by the extension.
    pub const METADATA: &str = "metadata";
    /// Shared-state content key for regular states.
    pub const STATE_DATA: &str = "state.data";
    /// Shared-state content key for XDM states.
    pub const XDM_STATE_DATA: &str = "xdm.state.data";
}

/// The Spyglass extension registered with the host SDK.
pub struct InspectionExtension {
    orchestrator: Arc<SessionOrchestrator>,
    registry: Arc<dyn StateRegistry>,
}

impl InspectionExtension {
    /// Wire the extension to an orchestrator and the host state registry.
    #[must_use]
    pub fn new(orchestrator: Arc<SessionOrchestrator>, registry: Arc<dyn StateRegistry>) -> Self {
        Self { orchestrator, registry }
    }

    /// Registration hook.
    ///
    /// Arms the idle countdown and tries to resume a stored session, so an
    /// app relaunched mid-debugging reconnects without a new pairing.
    pub fn on_registered(&self) {
        self.orchestrator.activate();
        if self.orchestrator.reconnect_to_stored_session() {
            info!("resumed stored inspection session");
        }
    }

    /// Start a PIN session from a deep link.
    pub fn start_session(&self, deep_link: &str) {
        self.orchestrator.start_session(deep_link);
    }

    /// Start the quick-connect flow.
    pub fn start_session_quick_connect(&self) {
        self.orchestrator.start_session_quick_connect();
    }

    /// Whether queued events still have anywhere to go.
    #[must_use]
    pub fn can_process_sdk_events(&self) -> bool {
        self.orchestrator.can_process_sdk_events()
    }

    /// Session-request command: a deep link or a quick-connect flag.
    /// Anything else is a logged no-op.
    pub fn handle_session_request(&self, event: &SdkEvent) {
        if let Some(url) = event.data_string(data_key::START_SESSION_URL) {
            debug!(url, "session requested via deep link");
            self.orchestrator.start_session(url);
            return;
        }
        if event.data_bool(data_key::QUICK_CONNECT) {
            debug!("session requested via quick connect");
            self.orchestrator.start_session_quick_connect();
            return;
        }
        debug!("session request carried no usable data, ignoring");
    }

    /// Wildcard hook: wrap any SDK event and queue it for the service.
    ///
    /// Shared-state changes are enriched with the owner's actual state; a
    /// missing owner or missing content drops the event.
    pub fn handle_wildcard_event(&self, event: &SdkEvent) {
        if !self.orchestrator.can_process_sdk_events() {
            return;
        }
        if event.is_shared_state_change() {
            self.handle_shared_state_event(event);
            return;
        }
        self.orchestrator
            .queue_event(InspectionEvent::generic(wrap_event(event, None)));
    }

    fn handle_shared_state_event(&self, event: &SdkEvent) {
        let Some(owner) = event.data_string(data_key::STATE_OWNER) else {
            debug!("shared state change without a state owner, dropping");
            return;
        };
        let xdm = event.is_xdm_shared_state();
        let Some(content) = self.registry.shared_state(owner, xdm) else {
            debug!(owner, "no shared state content, dropping");
            return;
        };

        let key = if xdm { payload_key::XDM_STATE_DATA } else { payload_key::STATE_DATA };
        let mut metadata = Map::new();
        let _ = metadata.insert(key.to_owned(), Value::Object(content));
        self.orchestrator
            .queue_event(InspectionEvent::generic(wrap_event(event, Some(metadata))));
    }
}

/// Wrap an SDK event into the generic inspection payload.
fn wrap_event(event: &SdkEvent, metadata: Option<Map<String, Value>>) -> Map<String, Value> {
    let mut payload = Map::new();
    let _ = payload.insert(payload_key::EVENT_NAME.to_owned(), json!(event.name));
    let _ = payload.insert(
        payload_key::EVENT_TYPE.to_owned(),
        json!(event.event_type.to_lowercase()),
    );
    let _ = payload.insert(
        payload_key::EVENT_SOURCE.to_owned(),
        json!(event.source.to_lowercase()),
    );
    let _ = payload.insert(payload_key::EVENT_UID.to_owned(), json!(event.uid));
    if let Some(parent) = &event.parent_uid {
        let _ = payload.insert(payload_key::EVENT_PARENT_UID.to_owned(), json!(parent));
    }
    if let Some(data) = &event.data {
        let _ = payload.insert(payload_key::EVENT_DATA.to_owned(), Value::Object(data.clone()));
    }
    if let Some(metadata) = metadata {
        let _ = payload.insert(payload_key::METADATA.to_owned(), Value::Object(metadata));
    }
    payload
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use spyglass_core::uri::format_connect_url;
    use spyglass_core::{Environment, SessionId};
    use spyglass_session::test_utils::{
        ConnectScript, FixedHost, FixedRegistry, MemoryStore, RecordingPresentation,
        ScriptedTransportFactory, wait_for_status,
    };
    use spyglass_session::{OrchestratorConfig, PresentationType, SessionStatus};

    use crate::sdk_event::{event_name, event_source, event_type};

    const SESSION_A: &str = "6b9380c8-813d-4a5c-a08f-5b5f4dcef661";

    struct Harness {
        extension: InspectionExtension,
        orchestrator: Arc<SessionOrchestrator>,
        factory: Arc<ScriptedTransportFactory>,
        registry: Arc<FixedRegistry>,
        presentation: Arc<RecordingPresentation>,
    }

    fn harness_with_store(store: Arc<MemoryStore>) -> Harness {
        let factory = ScriptedTransportFactory::new(ConnectScript::Ok);
        let registry = FixedRegistry::new(Some("97D1F9@SpyglassOrg"));
        let presentation = RecordingPresentation::new();
        let orchestrator = SessionOrchestrator::new(
            OrchestratorConfig::default(),
            factory.clone(),
            store,
            registry.clone(),
            FixedHost::new(),
            presentation.clone(),
            Vec::new(),
        );
        let extension = InspectionExtension::new(orchestrator.clone(), registry.clone());
        Harness { extension, orchestrator, factory, registry, presentation }
    }

    fn make_harness() -> Harness {
        harness_with_store(MemoryStore::new())
    }

    /// Connect a tokened session and wait until the replayed events arrive.
    async fn connect_and_collect(h: &Harness, expected: usize) -> Vec<InspectionEvent> {
        h.orchestrator
            .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
            .unwrap();
        let session = h.orchestrator.active_session().unwrap();
        wait_for_status(&session, SessionStatus::Connected).await;

        let arrived = tokio::time::timeout(Duration::from_secs(2), async {
            while h.factory.transport.sent_events().len() < expected {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(arrived.is_ok(), "expected {expected} events to reach the transport");
        h.factory.transport.sent_events()
    }

    fn request_event(data: Map<String, Value>) -> SdkEvent {
        SdkEvent::new("Inspection Request", event_type::INSPECTION, event_source::REQUEST_CONTENT)
            .with_data(data)
    }

    fn shared_state_event(name: &str, owner: Option<&str>) -> SdkEvent {
        let mut data = Map::new();
        if let Some(owner) = owner {
            let _ = data.insert(data_key::STATE_OWNER.to_owned(), json!(owner));
        }
        SdkEvent::new(name, event_type::HUB, event_source::SHARED_STATE).with_data(data)
    }

    #[test]
    fn wrap_keeps_name_and_lowercases_type_and_source() {
        let event = SdkEvent::new("App Launch", "GenericLifecycle", "RequestContent");
        let payload = wrap_event(&event, None);

        assert_eq!(payload["eventName"], "App Launch");
        assert_eq!(payload["eventType"], "genericlifecycle");
        assert_eq!(payload["eventSource"], "requestcontent");
        assert_eq!(payload["eventUid"], json!(event.uid));
        assert!(payload.get("eventParentUid").is_none());
        assert!(payload.get("eventData").is_none());
        assert!(payload.get("metadata").is_none());
    }

    #[test]
    fn wrap_carries_parent_data_and_metadata() {
        let mut data = Map::new();
        let _ = data.insert("key".to_owned(), json!("value"));
        let event = SdkEvent::new("x", "t", "s").with_data(data).with_parent("parent-9");

        let mut metadata = Map::new();
        let _ = metadata.insert("state.data".to_owned(), json!({"a": 1}));
        let payload = wrap_event(&event, Some(metadata));

        assert_eq!(payload["eventParentUid"], "parent-9");
        assert_eq!(payload["eventData"]["key"], "value");
        assert_eq!(payload["metadata"]["state.data"]["a"], 1);
    }

    #[tokio::test]
    async fn session_request_with_deep_link_starts_pin_flow() {
        let h = make_harness();
        let mut data = Map::new();
        let _ = data.insert(
            data_key::START_SESSION_URL.to_owned(),
            json!(format!("spyglass://session?adb_validation_sessionid={SESSION_A}")),
        );

        h.extension.handle_session_request(&request_event(data));

        assert!(h.orchestrator.active_session().is_some());
        assert_eq!(*h.presentation.launched.lock(), vec![PresentationType::Pin]);
    }

    #[tokio::test]
    async fn session_request_with_quick_connect_flag_starts_that_flow() {
        let h = make_harness();
        let mut data = Map::new();
        let _ = data.insert(data_key::QUICK_CONNECT.to_owned(), json!(true));

        h.extension.handle_session_request(&request_event(data));

        assert!(h.orchestrator.active_session().is_none());
        assert_eq!(*h.presentation.launched.lock(), vec![PresentationType::QuickConnect]);
    }

    #[tokio::test]
    async fn session_request_without_usable_data_is_ignored() {
        let h = make_harness();

        h.extension.handle_session_request(&request_event(Map::new()));
        let mut data = Map::new();
        let _ = data.insert(data_key::QUICK_CONNECT.to_owned(), json!(false));
        h.extension.handle_session_request(&request_event(data));
        let mut data = Map::new();
        let _ = data.insert(data_key::START_SESSION_URL.to_owned(), json!(""));
        h.extension.handle_session_request(&request_event(data));

        assert!(h.orchestrator.active_session().is_none());
        assert!(h.presentation.launched.lock().is_empty());
    }

    #[tokio::test]
    async fn wildcard_events_are_wrapped_and_delivered() {
        let h = make_harness();
        let event = SdkEvent::new("App Launch", "GenericLifecycle", "RequestContent")
            .with_parent("parent-1");
        h.extension.handle_wildcard_event(&event);

        let sent = connect_and_collect(&h, 1).await;
        let payload = &sent[0].payload;
        assert_eq!(payload["eventName"], "App Launch");
        assert_eq!(payload["eventType"], "genericlifecycle");
        assert_eq!(payload["eventSource"], "requestcontent");
        assert_eq!(payload["eventParentUid"], "parent-1");
        assert_eq!(sent[0].vendor, spyglass_core::constants::VENDOR_MOBILE);
    }

    #[tokio::test]
    async fn shared_state_without_owner_is_dropped() {
        let h = make_harness();
        h.extension
            .handle_wildcard_event(&shared_state_event(event_name::SHARED_STATE_CHANGE, None));

        // Only the follow-up generic event arrives.
        h.extension.handle_wildcard_event(&SdkEvent::new("follow-up", "t", "s"));
        let sent = connect_and_collect(&h, 1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload["eventName"], "follow-up");
    }

    #[tokio::test]
    async fn shared_state_without_content_is_dropped() {
        let h = make_harness();
        h.extension.handle_wildcard_event(&shared_state_event(
            event_name::SHARED_STATE_CHANGE,
            Some("com.spyglass.module.config"),
        ));

        h.extension.handle_wildcard_event(&SdkEvent::new("follow-up", "t", "s"));
        let sent = connect_and_collect(&h, 1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload["eventName"], "follow-up");
    }

    #[tokio::test]
    async fn shared_state_content_lands_under_state_data() {
        let h = make_harness();
        let mut state = Map::new();
        let _ = state.insert("build".to_owned(), json!("1.2.3"));
        h.registry.set_shared_state("com.spyglass.module.config", state);

        h.extension.handle_wildcard_event(&shared_state_event(
            event_name::SHARED_STATE_CHANGE,
            Some("com.spyglass.module.config"),
        ));

        let sent = connect_and_collect(&h, 1).await;
        let metadata = &sent[0].payload["metadata"];
        assert_eq!(metadata["state.data"]["build"], "1.2.3");
        assert!(metadata.get("xdm.state.data").is_none());
    }

    #[tokio::test]
    async fn xdm_shared_state_content_lands_under_xdm_key() {
        let h = make_harness();
        let mut state = Map::new();
        let _ = state.insert("identityMap".to_owned(), json!({"ECID": []}));
        h.registry.set_shared_state("com.spyglass.module.identity", state);

        h.extension.handle_wildcard_event(&shared_state_event(
            event_name::XDM_SHARED_STATE_CHANGE,
            Some("com.spyglass.module.identity"),
        ));

        let sent = connect_and_collect(&h, 1).await;
        let metadata = &sent[0].payload["metadata"];
        assert!(metadata.get("xdm.state.data").is_some());
        assert!(metadata.get("state.data").is_none());
    }

    #[tokio::test]
    async fn wildcard_events_stop_after_buffer_release() {
        let h = make_harness();
        h.orchestrator.terminate_session(true);
        assert!(!h.extension.can_process_sdk_events());

        h.extension.handle_wildcard_event(&SdkEvent::new("late", "t", "s"));

        h.orchestrator
            .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
            .unwrap();
        let session = h.orchestrator.active_session().unwrap();
        wait_for_status(&session, SessionStatus::Connected).await;
        assert!(h.factory.transport.sent_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn registration_arms_the_idle_countdown() {
        let h = make_harness();
        h.extension.on_registered();
        assert!(h.extension.can_process_sdk_events());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!h.extension.can_process_sdk_events());
    }

    #[tokio::test]
    async fn registration_resumes_a_stored_session() {
        let url = format_connect_url(
            "observe.spyglass.net",
            Environment::Prod,
            &SessionId::parse(SESSION_A).unwrap(),
            "8877",
            "97D1F9@SpyglassOrg",
            "0190f2a4-7b00-7000-8000-5e5f4dcef661",
        );
        let h = harness_with_store(MemoryStore::with_url(&url));

        h.extension.on_registered();

        let session = h.orchestrator.active_session().expect("stored session should resume");
        wait_for_status(&session, SessionStatus::Connected).await;
        assert!(h.presentation.launched.lock().is_empty());
    }
}
