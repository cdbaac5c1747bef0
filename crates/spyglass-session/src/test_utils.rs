//! Test doubles for the session layer.
//!
//! Hand-rolled fakes shared by this crate's unit tests, the integration
//! tests, and downstream crates. Not part of the stable API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{Notify, mpsc};

use spyglass_core::{InspectionEvent, SessionDescriptor, SessionId};
use spyglass_store::{ConnectionStore, StoreError};

use crate::host::{HostAppHandle, StateRegistry};
use crate::orchestrator::UiOperationHandle;
use crate::plugin::InspectionPlugin;
use crate::presentation::{PresentationHost, PresentationType};
use crate::session::Session;
use crate::status::{SessionStatus, SessionStatusListener};
use crate::transport::{SessionTransport, TransportError, TransportFactory};

/// How a [`ScriptedTransport`] answers `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectScript {
    /// Connect resolves immediately.
    Ok,
    /// Connect fails immediately.
    Refuse,
    /// Connect parks until [`ScriptedTransport::release_connect`].
    Hold,
}

/// Transport fake that records traffic and follows a connect script.
pub struct ScriptedTransport {
    script: ConnectScript,
    send_fails: AtomicBool,
    release: Notify,
    /// Events accepted by `send`, in order.
    pub sent: Mutex<Vec<InspectionEvent>>,
    /// Number of `connect` calls.
    pub connects: AtomicUsize,
    /// Number of `disconnect` calls.
    pub disconnects: AtomicUsize,
    /// Last URL handed to `connect`.
    pub last_url: Mutex<Option<String>>,
    /// Foreground hints received, in order.
    pub visibility: Mutex<Vec<bool>>,
}

impl ScriptedTransport {
    /// Transport following the given script.
    #[must_use]
    pub fn new(script: ConnectScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            send_fails: AtomicBool::new(false),
            release: Notify::new(),
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            last_url: Mutex::new(None),
            visibility: Mutex::new(Vec::new()),
        })
    }

    /// Let a held connect complete.
    pub fn release_connect(&self) {
        self.release.notify_one();
    }

    /// Make subsequent `send` calls fail.
    pub fn fail_sends(&self) {
        self.send_fails.store(true, Ordering::SeqCst);
    }

    /// Events sent so far.
    #[must_use]
    pub fn sent_events(&self) -> Vec<InspectionEvent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let _ = self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock() = Some(url.to_owned());
        match self.script {
            ConnectScript::Ok => Ok(()),
            ConnectScript::Refuse => Err(TransportError::ConnectFailed("scripted refusal".into())),
            ConnectScript::Hold => {
                self.release.notified().await;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) {
        let _ = self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn send(&self, event: &InspectionEvent) -> Result<(), TransportError> {
        if self.send_fails.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("scripted send failure".into()));
        }
        self.sent.lock().push(event.clone());
        Ok(())
    }

    fn host_visibility_changed(&self, foreground: bool) {
        self.visibility.lock().push(foreground);
    }
}

/// Factory handing every session the same scripted transport; captures the
/// inbound sender so tests can inject service traffic.
pub struct ScriptedTransportFactory {
    /// The transport every session gets.
    pub transport: Arc<ScriptedTransport>,
    /// Inbound sender of the most recently created session.
    pub inbound: Mutex<Option<mpsc::UnboundedSender<InspectionEvent>>>,
    /// Descriptors passed to `create_transport`, in order.
    pub descriptors: Mutex<Vec<SessionDescriptor>>,
}

impl ScriptedTransportFactory {
    /// Factory over a fresh transport with the given script.
    #[must_use]
    pub fn new(script: ConnectScript) -> Arc<Self> {
        Self::with_transport(ScriptedTransport::new(script))
    }

    /// Factory over a specific transport instance.
    #[must_use]
    pub fn with_transport(transport: Arc<ScriptedTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            inbound: Mutex::new(None),
            descriptors: Mutex::new(Vec::new()),
        })
    }

    /// Push an inbound event as if the service had sent it.
    pub fn push_inbound(&self, event: InspectionEvent) {
        if let Some(tx) = self.inbound.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn create_transport(
        &self,
        descriptor: &SessionDescriptor,
        inbound: mpsc::UnboundedSender<InspectionEvent>,
    ) -> Arc<dyn SessionTransport> {
        self.descriptors.lock().push(descriptor.clone());
        *self.inbound.lock() = Some(inbound);
        self.transport.clone()
    }
}

/// In-memory [`ConnectionStore`] with a fixed client id.
pub struct MemoryStore {
    url: Mutex<Option<String>>,
    client: String,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            url: Mutex::new(None),
            client: "0190f2a4-7b00-7000-8000-5e5f4dcef661".to_owned(),
        })
    }

    /// Store seeded with a connect URL.
    #[must_use]
    pub fn with_url(url: &str) -> Arc<Self> {
        let store = Self::new();
        *store.url.lock() = Some(url.to_owned());
        store
    }

    /// Currently stored URL.
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.url.lock().clone()
    }
}

impl ConnectionStore for MemoryStore {
    fn stored_connection_url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    fn save_connection_url(&self, url: &str) -> Result<(), StoreError> {
        *self.url.lock() = Some(url.to_owned());
        Ok(())
    }

    fn clear_connection_url(&self) -> Result<(), StoreError> {
        *self.url.lock() = None;
        Ok(())
    }

    fn client_id(&self) -> String {
        self.client.clone()
    }
}

/// Listener that records every transition.
#[derive(Default)]
pub struct RecordingListener {
    statuses: Mutex<Vec<SessionStatus>>,
}

impl RecordingListener {
    /// Fresh recorder.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transitions observed so far, in order.
    #[must_use]
    pub fn observed(&self) -> Vec<SessionStatus> {
        self.statuses.lock().clone()
    }
}

impl SessionStatusListener for RecordingListener {
    fn on_status_changed(&self, status: SessionStatus) {
        self.statuses.lock().push(status);
    }
}

/// Plugin that records control events and lifecycle calls.
pub struct RecordingPlugin {
    vendor: String,
    control: String,
    /// Control events received, in order.
    pub events: Mutex<Vec<InspectionEvent>>,
    /// `on_session_connected` call count.
    pub connected: AtomicUsize,
    /// `on_session_disconnected` call count.
    pub disconnected: AtomicUsize,
}

impl RecordingPlugin {
    /// Plugin registered for `vendor` and `control`.
    #[must_use]
    pub fn new(vendor: &str, control: &str) -> Arc<Self> {
        Arc::new(Self {
            vendor: vendor.to_owned(),
            control: control.to_owned(),
            events: Mutex::new(Vec::new()),
            connected: AtomicUsize::new(0),
            disconnected: AtomicUsize::new(0),
        })
    }
}

impl InspectionPlugin for RecordingPlugin {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    fn control_type(&self) -> &str {
        &self.control
    }

    fn on_event(&self, event: &InspectionEvent) {
        self.events.lock().push(event.clone());
    }

    fn on_session_connected(&self) {
        let _ = self.connected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_disconnected(&self) {
        let _ = self.disconnected.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry with a fixed org id; records publishes and clears.
pub struct FixedRegistry {
    org: Option<String>,
    /// Session ids published, in order.
    pub published: Mutex<Vec<SessionId>>,
    /// Number of `clear_session` calls.
    pub cleared: AtomicUsize,
    /// Shared states served by owner name.
    pub states: Mutex<HashMap<String, Map<String, Value>>>,
}

impl FixedRegistry {
    /// Registry answering `org_id` with the given value.
    #[must_use]
    pub fn new(org: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            org: org.map(str::to_owned),
            published: Mutex::new(Vec::new()),
            cleared: AtomicUsize::new(0),
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Serve `state` for `owner` (both XDM and regular lookups).
    pub fn set_shared_state(&self, owner: &str, state: Map<String, Value>) {
        let _ = self.states.lock().insert(owner.to_owned(), state);
    }
}

impl StateRegistry for FixedRegistry {
    fn org_id(&self) -> Option<String> {
        self.org.clone()
    }

    fn publish_session(&self, session_id: &SessionId) {
        self.published.lock().push(session_id.clone());
    }

    fn clear_session(&self) {
        let _ = self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn shared_state(&self, owner: &str, _xdm: bool) -> Option<Map<String, Value>> {
        self.states.lock().get(owner).cloned()
    }
}

/// Host handle with settable debug and foreground flags.
pub struct FixedHost {
    /// Debug-build flag.
    pub debug: AtomicBool,
    /// Foreground-UI flag.
    pub foreground: AtomicBool,
}

impl FixedHost {
    /// Host with both quick-connect gates open.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            debug: AtomicBool::new(true),
            foreground: AtomicBool::new(true),
        })
    }
}

impl HostAppHandle for FixedHost {
    fn is_debug_build(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    fn has_foreground_ui(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }
}

/// Presentation host that records launches and keeps the operation handle.
pub struct RecordingPresentation {
    accept: AtomicBool,
    /// Flows launched, in order.
    pub launched: Mutex<Vec<PresentationType>>,
    /// Flows dismissed, in order.
    pub dismissed: Mutex<Vec<PresentationType>>,
    /// Handle from the most recent accepted launch.
    pub operations: Mutex<Option<UiOperationHandle>>,
}

impl RecordingPresentation {
    /// Presentation that accepts every launch.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
            launched: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
            operations: Mutex::new(None),
        })
    }

    /// Refuse future launches.
    pub fn refuse_launches(&self) {
        self.accept.store(false, Ordering::SeqCst);
    }

    /// Handle captured by the last accepted launch.
    #[must_use]
    pub fn last_operations(&self) -> Option<UiOperationHandle> {
        self.operations.lock().clone()
    }
}

impl PresentationHost for RecordingPresentation {
    fn launch(&self, flow: PresentationType, operations: UiOperationHandle) -> bool {
        self.launched.lock().push(flow);
        if !self.accept.load(Ordering::SeqCst) {
            return false;
        }
        *self.operations.lock() = Some(operations);
        true
    }

    fn dismiss(&self, flow: PresentationType) {
        self.dismissed.lock().push(flow);
    }
}

/// Poll until `session` reports `status`, panicking after two seconds.
///
/// Polls with short sleeps, so it also works under `start_paused` runtimes
/// where virtual time auto-advances.
pub async fn wait_for_status(session: &Session, status: SessionStatus) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if session.status() == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "session never reached {status}, at {}", session.status());
}
