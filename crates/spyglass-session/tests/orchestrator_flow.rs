//! End-to-end session flows through the orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, json};

use spyglass_core::constants::{VENDOR_SERVICE, control_type, event_kind};
use spyglass_core::uri::format_connect_url;
use spyglass_core::{Environment, InspectionEvent, SessionId};
use spyglass_session::test_utils::{
    ConnectScript, FixedHost, FixedRegistry, MemoryStore, RecordingListener,
    RecordingPresentation, ScriptedTransportFactory, wait_for_status,
};
use spyglass_session::{
    OrchestratorConfig, PresentationHost, PresentationType, SessionOrchestrator, SessionStatus,
    SessionStatusListener, UiOperationHandle,
};

const SESSION_A: &str = "6b9380c8-813d-4a5c-a08f-5b5f4dcef661";

struct Harness {
    orchestrator: Arc<SessionOrchestrator>,
    factory: Arc<ScriptedTransportFactory>,
    store: Arc<MemoryStore>,
    registry: Arc<FixedRegistry>,
    presentation: Arc<RecordingPresentation>,
}

fn harness_with_store(script: ConnectScript, store: Arc<MemoryStore>) -> Harness {
    let factory = ScriptedTransportFactory::new(script);
    let registry = FixedRegistry::new(Some("97D1F9@SpyglassOrg"));
    let presentation = RecordingPresentation::new();
    let orchestrator = SessionOrchestrator::new(
        OrchestratorConfig::default(),
        factory.clone(),
        store.clone(),
        registry.clone(),
        FixedHost::new(),
        presentation.clone(),
        Vec::new(),
    );
    Harness { orchestrator, factory, store, registry, presentation }
}

fn make_harness(script: ConnectScript) -> Harness {
    harness_with_store(script, MemoryStore::new())
}

fn deep_link(session_id: &str) -> String {
    format!("spyglass://session?adb_validation_sessionid={session_id}")
}

fn marker_event(marker: u64) -> InspectionEvent {
    let mut payload = Map::new();
    let _ = payload.insert("marker".to_owned(), marker.into());
    InspectionEvent::generic(payload)
}

fn sent_markers(harness: &Harness) -> Vec<u64> {
    harness
        .factory
        .transport
        .sent_events()
        .iter()
        .map(|event| event.payload["marker"].as_u64().unwrap())
        .collect()
}

async fn wait_for_sent(harness: &Harness, count: usize) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while harness.factory.transport.sent_events().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "expected {count} sent events, saw {:?}",
        sent_markers(harness)
    );
}

#[tokio::test]
async fn pin_flow_connects_and_replays_buffered_events() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.queue_event(marker_event(1));
    h.orchestrator.queue_event(marker_event(2));

    let link = format!("{}&env=stage", deep_link(SESSION_A));
    h.orchestrator.start_session(&link);

    let session = h.orchestrator.active_session().expect("session should exist");
    assert_eq!(session.descriptor().environment, Environment::Stage);
    wait_for_status(&session, SessionStatus::Authorizing).await;
    assert_eq!(*h.presentation.launched.lock(), vec![PresentationType::Pin]);
    assert_eq!(h.registry.published.lock().len(), 1);

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_connect("1234");
    wait_for_status(&session, SessionStatus::Connected).await;

    let url = h.store.current_url().expect("url persisted on connect");
    assert!(url.starts_with("wss://connect-stage.observe.spyglass.net/client/v1?"), "{url}");
    assert!(url.contains("token=1234"));

    // Pre-session traffic replays first, then live traffic.
    wait_for_sent(&h, 2).await;
    h.orchestrator.queue_event(marker_event(3));
    wait_for_sent(&h, 3).await;
    assert_eq!(sent_markers(&h), vec![1, 2, 3]);
}

#[tokio::test]
async fn ui_disconnect_forgets_the_stored_record() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.start_session(&deep_link(SESSION_A));
    let session = h.orchestrator.active_session().expect("session should exist");

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_connect("1234");
    wait_for_status(&session, SessionStatus::Connected).await;
    assert!(h.store.current_url().is_some());

    ops.on_disconnect();

    assert!(h.orchestrator.active_session().is_none());
    assert!(h.store.current_url().is_none());
    assert!(!h.orchestrator.can_process_sdk_events());
    assert!(h.presentation.dismissed.lock().contains(&PresentationType::Pin));
    assert_eq!(h.registry.cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_have_one_winner() {
    let h = make_harness(ConnectScript::Ok);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = h.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
                .is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(h.registry.published.lock().len(), 1);
    assert!(h.orchestrator.active_session().is_some());
}

#[tokio::test]
async fn terminate_during_connect_stays_disconnected() {
    let h = make_harness(ConnectScript::Hold);
    let listener = RecordingListener::new();
    let erased: Arc<dyn SessionStatusListener> = listener.clone();
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), Some(erased), PresentationType::Pin)
        .unwrap();
    let session = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&session, SessionStatus::Authorizing).await;

    h.orchestrator.terminate_session(true);
    h.factory.transport.release_connect();
    wait_for_status(&session, SessionStatus::Disconnected).await;

    let observed = listener.observed();
    assert!(
        !observed.contains(&SessionStatus::Connected),
        "late connect success leaked through: {observed:?}"
    );
    assert!(h.orchestrator.active_session().is_none());
    assert_eq!(h.registry.cleared.load(Ordering::SeqCst), 1);
    assert!(h.presentation.dismissed.lock().contains(&PresentationType::Pin));
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_releases_the_buffer() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.activate();
    h.orchestrator.queue_event(marker_event(1));
    assert!(h.orchestrator.can_process_sdk_events());

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(!h.orchestrator.can_process_sdk_events());
    h.orchestrator.queue_event(marker_event(2));
    assert!(!h.orchestrator.can_process_sdk_events());

    // A session can still start afterwards; it just replays nothing.
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
        .unwrap();
    let session = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&session, SessionStatus::Connected).await;
    assert!(h.orchestrator.can_process_sdk_events());
    assert!(h.factory.transport.sent_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_start_cancels_the_idle_countdown() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.activate();
    h.orchestrator.queue_event(marker_event(1));

    tokio::time::sleep(Duration::from_secs(3)).await;
    h.orchestrator.start_session(&deep_link(SESSION_A));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.orchestrator.active_session().is_some());
    assert!(h.orchestrator.can_process_sdk_events());
}

#[tokio::test(start_paused = true)]
async fn failed_start_attempt_still_cancels_the_countdown() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.activate();
    h.orchestrator.queue_event(marker_event(1));

    h.orchestrator.start_session("spyglass://session?unrelated=true");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.orchestrator.active_session().is_none());
    assert!(h.orchestrator.can_process_sdk_events());
}

#[tokio::test(start_paused = true)]
async fn rearming_replaces_the_countdown() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.activate();

    tokio::time::sleep(Duration::from_secs(3)).await;
    h.orchestrator.activate();

    // The first deadline passes without firing.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(h.orchestrator.can_process_sdk_events());

    // The second one fires on schedule.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!h.orchestrator.can_process_sdk_events());
}

#[tokio::test]
async fn reconnect_requires_a_complete_stored_record() {
    let nothing = make_harness(ConnectScript::Ok);
    assert!(!nothing.orchestrator.reconnect_to_stored_session());

    let garbage = harness_with_store(ConnectScript::Ok, MemoryStore::with_url("not a url"));
    assert!(!garbage.orchestrator.reconnect_to_stored_session());

    let missing_token = harness_with_store(
        ConnectScript::Ok,
        MemoryStore::with_url(&format!(
            "wss://connect.observe.spyglass.net/client/v1?sessionId={SESSION_A}&orgId=o%40rg&clientId=c1"
        )),
    );
    assert!(!missing_token.orchestrator.reconnect_to_stored_session());
    assert!(missing_token.orchestrator.active_session().is_none());
}

#[tokio::test]
async fn reconnect_accepts_service_format_session_ids() {
    // Stored records carry the id the service issued, which need not be a
    // UUID; all four fields present is the whole requirement.
    let h = harness_with_store(
        ConnectScript::Ok,
        MemoryStore::with_url(
            "wss://connect.observe.spyglass.net/client/v1\
             ?sessionId=SampleSessionID&token=1234&orgId=sampleOrg&clientId=SampleClientID",
        ),
    );

    assert!(h.orchestrator.reconnect_to_stored_session());
    let session = h.orchestrator.active_session().expect("session should exist");
    assert_eq!(session.descriptor().session_id.as_str(), "SampleSessionID");
    wait_for_status(&session, SessionStatus::Connected).await;

    let connect_url = h.factory.transport.last_url.lock().clone().unwrap();
    assert!(connect_url.contains("sessionId=SampleSessionID"));
    assert!(connect_url.contains("token=1234"));
}

#[tokio::test]
async fn reconnect_resumes_silently_with_stored_token() {
    let url = format_connect_url(
        "observe.spyglass.net",
        Environment::Stage,
        &SessionId::parse(SESSION_A).unwrap(),
        "8877",
        "97D1F9@SpyglassOrg",
        "0190f2a4-7b00-7000-8000-5e5f4dcef661",
    );
    let h = harness_with_store(ConnectScript::Ok, MemoryStore::with_url(&url));

    assert!(h.orchestrator.reconnect_to_stored_session());
    let session = h.orchestrator.active_session().expect("session should exist");
    assert_eq!(session.descriptor().environment, Environment::Stage);
    wait_for_status(&session, SessionStatus::Connected).await;

    // The stored token rode along, so no PIN UI.
    assert!(h.presentation.launched.lock().is_empty());
    let connect_url = h.factory.transport.last_url.lock().clone().unwrap();
    assert!(connect_url.contains("token=8877"));
    assert!(connect_url.starts_with("wss://connect-stage."));

    // A second resume is refused while the session lives.
    assert!(!h.orchestrator.reconnect_to_stored_session());
}

#[tokio::test]
async fn buffer_replays_into_a_later_session() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
        .unwrap();
    let first = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&first, SessionStatus::Connected).await;

    h.orchestrator.queue_event(marker_event(1));
    h.orchestrator.queue_event(marker_event(2));
    wait_for_sent(&h, 2).await;

    // Terminate without purging: the buffer keeps its copies.
    h.orchestrator.terminate_session(false);
    assert!(h.orchestrator.active_session().is_none());
    assert!(h.orchestrator.can_process_sdk_events());

    // The stored record resumes the session; history replays in order.
    assert!(h.orchestrator.reconnect_to_stored_session());
    let second = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&second, SessionStatus::Connected).await;
    wait_for_sent(&h, 4).await;
    assert_eq!(sent_markers(&h), vec![1, 2, 1, 2]);
}

#[tokio::test]
async fn quick_connect_flow_end_to_end() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.start_session_quick_connect();
    assert_eq!(*h.presentation.launched.lock(), vec![PresentationType::QuickConnect]);

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_quick_connect(SESSION_A, "secret-token");

    let session = h.orchestrator.active_session().expect("session should exist");
    assert_eq!(session.presentation_type(), PresentationType::QuickConnect);
    wait_for_status(&session, SessionStatus::Connected).await;

    let url = h.store.current_url().expect("url persisted on connect");
    assert!(url.starts_with("wss://connect.observe.spyglass.net/"), "{url}");
    assert!(url.contains("token=secret-token"));
}

#[tokio::test]
async fn quick_connect_cancel_reopens_the_flow() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.start_session_quick_connect();

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_cancel();
    assert_eq!(*h.presentation.dismissed.lock(), vec![PresentationType::QuickConnect]);

    h.orchestrator.start_session_quick_connect();
    assert_eq!(h.presentation.launched.lock().len(), 2);
}

#[tokio::test]
async fn remote_disconnect_releases_the_session_but_keeps_the_buffer() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.queue_event(marker_event(1));
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
        .unwrap();
    let session = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&session, SessionStatus::Connected).await;

    let mut payload = Map::new();
    let _ = payload.insert("type".to_owned(), json!(control_type::DISCONNECT));
    h.factory.push_inbound(InspectionEvent::with_vendor(
        VENDOR_SERVICE,
        event_kind::CONTROL,
        payload,
    ));
    wait_for_status(&session, SessionStatus::Disconnected).await;

    let released = tokio::time::timeout(Duration::from_secs(2), async {
        while h.orchestrator.active_session().is_some() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "orchestrator did not release the closed session");
    assert!(h.orchestrator.can_process_sdk_events());
    assert_eq!(h.registry.cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_failure_releases_the_session_slot() {
    let h = make_harness(ConnectScript::Refuse);
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
        .unwrap();

    let released = tokio::time::timeout(Duration::from_secs(2), async {
        while h.orchestrator.active_session().is_some() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "failed session was never released");

    // The slot is free for another attempt.
    let result = h.orchestrator.create_session(
        SESSION_A,
        Environment::Prod,
        Some("4411"),
        None,
        PresentationType::Pin,
    );
    assert!(result.is_ok());
}

#[tokio::test]
async fn host_visibility_hints_reach_the_transport() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator
        .create_session(SESSION_A, Environment::Prod, Some("4411"), None, PresentationType::Pin)
        .unwrap();
    let session = h.orchestrator.active_session().expect("session should exist");
    wait_for_status(&session, SessionStatus::Connected).await;

    h.orchestrator.host_backgrounded();
    h.orchestrator.host_foregrounded();

    let seen = tokio::time::timeout(Duration::from_secs(2), async {
        while h.factory.transport.visibility.lock().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(seen.is_ok());
    assert_eq!(*h.factory.transport.visibility.lock(), vec![false, true]);
}

#[tokio::test]
async fn quick_connect_approval_accepts_service_issued_ids() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.start_session_quick_connect();

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_quick_connect("SampleSessionID", "7777");

    let session = h.orchestrator.active_session().expect("approval should open the session");
    assert_eq!(session.descriptor().session_id.as_str(), "SampleSessionID");
    wait_for_status(&session, SessionStatus::Connected).await;

    let url = h.factory.transport.last_url.lock().clone().unwrap();
    assert!(url.contains("sessionId=SampleSessionID"));
    assert!(url.contains("token=7777"));
}

#[tokio::test]
async fn quick_connect_approval_with_empty_id_is_refused() {
    let h = make_harness(ConnectScript::Ok);
    h.orchestrator.start_session_quick_connect();

    let ops = h.presentation.last_operations().expect("operations handle");
    ops.on_quick_connect("", "7777");

    assert!(h.orchestrator.active_session().is_none());
    // The approval sheet is still up, so the flow stays pending and a
    // second start request does not relaunch it.
    h.orchestrator.start_session_quick_connect();
    assert_eq!(h.presentation.launched.lock().len(), 1);
}

/// Dismissal that reports cancellation back through the operation handle,
/// the way a host sheet's close callback does.
struct CancelReportingPresentation {
    operations: Mutex<Option<UiOperationHandle>>,
    launched: AtomicUsize,
    cancel_reported: AtomicBool,
}

impl CancelReportingPresentation {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            operations: Mutex::new(None),
            launched: AtomicUsize::new(0),
            cancel_reported: AtomicBool::new(false),
        })
    }
}

impl PresentationHost for CancelReportingPresentation {
    fn launch(&self, _flow: PresentationType, operations: UiOperationHandle) -> bool {
        let _ = self.launched.fetch_add(1, Ordering::SeqCst);
        *self.operations.lock() = Some(operations);
        true
    }

    fn dismiss(&self, _flow: PresentationType) {
        if self.cancel_reported.swap(true, Ordering::SeqCst) {
            return;
        }
        let operations = self.operations.lock().clone();
        if let Some(operations) = operations {
            operations.on_cancel();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminate_survives_a_dismiss_that_reports_cancel() {
    let presentation = CancelReportingPresentation::new();
    let orchestrator = SessionOrchestrator::new(
        OrchestratorConfig::default(),
        ScriptedTransportFactory::new(ConnectScript::Ok),
        MemoryStore::new(),
        FixedRegistry::new(Some("97D1F9@SpyglassOrg")),
        FixedHost::new(),
        presentation.clone(),
        Vec::new(),
    );

    orchestrator.start_session_quick_connect();
    assert_eq!(presentation.launched.load(Ordering::SeqCst), 1);

    let terminating = orchestrator.clone();
    let done = tokio::task::spawn_blocking(move || terminating.terminate_session(true));
    tokio::time::timeout(Duration::from_secs(2), done)
        .await
        .expect("terminate must complete when dismiss re-enters the orchestrator")
        .unwrap();

    // The cancel went through: the flow is no longer pending and can be
    // requested again.
    orchestrator.start_session_quick_connect();
    assert_eq!(presentation.launched.load(Ordering::SeqCst), 2);
}
