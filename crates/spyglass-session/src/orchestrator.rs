//! The session orchestrator.
//!
//! One orchestrator per SDK instance. It owns the single active session, the
//! outbound event buffer, the idle countdown, and the glue to the host app:
//! presentation, shared state, and the persisted connection record. Every
//! public entry point is safe to call from any thread; failures degrade to
//! logged no-ops so the host app never sees an inspection error.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use spyglass_core::uri::{self, ConnectionRecord};
use spyglass_core::{Environment, InspectionEvent, SessionDescriptor, SessionId};
use spyglass_store::ConnectionStore;

use crate::buffer::OutboundBuffer;
use crate::config::OrchestratorConfig;
use crate::errors::SessionError;
use crate::host::{HostAppHandle, StateRegistry};
use crate::plugin::{InspectionPlugin, PluginRegistry};
use crate::presentation::{PresentationHost, PresentationType};
use crate::session::Session;
use crate::status::{SessionStatus, SessionStatusListener};
use crate::transport::TransportFactory;

/// The active session plus the orchestrator's own release listener on it.
struct ActiveSession {
    session: Arc<Session>,
    guard: Arc<dyn SessionStatusListener>,
}

/// State behind the orchestrator lock.
///
/// The lock is never held across an await point. Collaborator calls made
/// under it (`StateRegistry`, `TransportFactory::create_transport`) are
/// documented as non-reentrant; `PresentationHost` calls always happen
/// after the lock is released, since a host may call straight back into the
/// orchestrator from them.
struct Inner {
    session: Option<ActiveSession>,
    buffer: OutboundBuffer,
    pending_quick_connect: bool,
    idle_cancel: Option<CancellationToken>,
}

/// Coordinates the lifecycle of the single active session.
///
/// Construct with [`SessionOrchestrator::new`] inside a tokio runtime; the
/// session workers and the idle countdown are spawned onto it.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    transports: Arc<dyn TransportFactory>,
    store: Arc<dyn ConnectionStore>,
    registry: Arc<dyn StateRegistry>,
    host: Arc<dyn HostAppHandle>,
    presentation: Arc<dyn PresentationHost>,
    plugins: Arc<PluginRegistry>,
    inner: Mutex<Inner>,
}

impl SessionOrchestrator {
    /// Wire up an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        transports: Arc<dyn TransportFactory>,
        store: Arc<dyn ConnectionStore>,
        registry: Arc<dyn StateRegistry>,
        host: Arc<dyn HostAppHandle>,
        presentation: Arc<dyn PresentationHost>,
        plugins: Vec<Arc<dyn InspectionPlugin>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            transports,
            store,
            registry,
            host,
            presentation,
            plugins: Arc::new(PluginRegistry::new(plugins)),
            inner: Mutex::new(Inner {
                session: None,
                buffer: OutboundBuffer::new(),
                pending_quick_connect: false,
                idle_cancel: None,
            }),
        })
    }

    /// Arm the idle countdown.
    ///
    /// If no session start happens within the configured idle timeout, the
    /// outbound buffer is released so an app that never pairs holds no event
    /// memory. Any session start attempt cancels the countdown; re-arming
    /// replaces a countdown already running.
    pub fn activate(self: &Arc<Self>) {
        let token = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.idle_cancel.replace(token.clone()) {
                previous.cancel();
            }
        }

        let orchestrator = Arc::downgrade(self);
        let idle_timeout = self.config.idle_timeout;
        let _ = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(idle_timeout) => {
                    if let Some(orchestrator) = orchestrator.upgrade() {
                        orchestrator.idle_timeout_fired();
                    }
                }
                () = token.cancelled() => {}
            }
        });
    }

    fn idle_timeout_fired(&self) {
        let dismiss = {
            let mut inner = self.inner.lock();
            // Re-check under the lock: a session start may have won the race.
            if inner.session.is_some() || inner.pending_quick_connect {
                return;
            }
            info!("no session started in time, releasing outbound buffer");
            self.terminate_locked(&mut inner, true)
        };
        for flow in dismiss {
            self.presentation.dismiss(flow);
        }
    }

    fn cancel_idle_countdown(&self) {
        if let Some(timer) = self.inner.lock().idle_cancel.take() {
            timer.cancel();
        }
    }

    // ─── Session lifecycle ───────────────────────────────────────────────

    /// Create and start a new session.
    ///
    /// At most one session exists at a time: with one already active this
    /// returns [`SessionError::SessionAlreadyActive`] and the active session
    /// is untouched. Any non-blank id is accepted; deep links get their
    /// UUID shape check before they reach here. Everything retained by the
    /// outbound buffer is replayed into the new session ahead of any new
    /// traffic.
    #[instrument(skip(self, token, listener))]
    pub fn create_session(
        self: &Arc<Self>,
        raw_session_id: &str,
        environment: Environment,
        token: Option<&str>,
        listener: Option<Arc<dyn SessionStatusListener>>,
        presentation_type: PresentationType,
    ) -> Result<(), SessionError> {
        let session_id = SessionId::parse(raw_session_id)?;

        // Collaborator reads stay outside the lock.
        let org_id = self.registry.org_id().unwrap_or_default();
        let client_id = self.store.client_id();

        let mut inner = self.inner.lock();
        if inner.session.is_some() {
            return Err(SessionError::SessionAlreadyActive);
        }
        if let Some(timer) = inner.idle_cancel.take() {
            timer.cancel();
        }

        let descriptor = SessionDescriptor {
            session_id: session_id.clone(),
            environment,
            token: token.map(str::to_owned),
            org_id,
            client_id,
        };
        let needs_pin = descriptor.token.is_none();
        let session = Session::launch(
            descriptor,
            presentation_type,
            self.config.service_domain.clone(),
            self.transports.as_ref(),
            self.store.clone(),
            self.plugins.clone(),
        );

        let guard: Arc<dyn SessionStatusListener> = Arc::new(SessionReleaseGuard {
            orchestrator: Arc::downgrade(self),
            session: Arc::downgrade(&session),
        });
        session.register_status_listener(guard.clone());
        if let Some(listener) = listener {
            session.register_status_listener(listener);
        }

        for event in inner.buffer.snapshot() {
            session.queue_outbound_event(event);
        }

        self.registry.publish_session(&session_id);
        inner.session = Some(ActiveSession { session: session.clone(), guard });
        inner.pending_quick_connect = false;
        drop(inner);

        debug!(session_id = %session_id, "session created");
        session.connect(None);
        if presentation_type == PresentationType::Pin && needs_pin {
            let launched = self.presentation.launch(PresentationType::Pin, self.ui_operation_handle());
            if !launched {
                warn!("pin presentation refused to launch");
            }
        }
        Ok(())
    }

    /// Start a PIN session from a deep link. Invalid input is a logged
    /// no-op, but any start attempt still cancels the idle countdown.
    #[instrument(skip(self))]
    pub fn start_session(self: &Arc<Self>, deep_link: &str) {
        self.cancel_idle_countdown();

        let Some(raw_id) = uri::session_id_from_deep_link(deep_link) else {
            debug!("deep link carries no usable session id, ignoring");
            return;
        };
        let environment = uri::environment_from_deep_link(deep_link);
        match self.create_session(&raw_id, environment, None, None, PresentationType::Pin) {
            Ok(()) => {}
            Err(e) => debug!(category = e.category(), "deep link session start refused: {e}"),
        }
    }

    /// Begin the quick-connect (device approval) flow.
    ///
    /// Refused unless there is no active session, no flow already pending,
    /// the host build is debuggable, and the host UI is foregrounded. All
    /// refusals are silent beyond a log line.
    #[instrument(skip(self))]
    pub fn start_session_quick_connect(self: &Arc<Self>) {
        self.cancel_idle_countdown();

        if !self.host.is_debug_build() {
            debug!("quick connect is only available in debug builds");
            return;
        }
        if !self.host.has_foreground_ui() {
            debug!("quick connect needs a foregrounded host UI");
            return;
        }
        {
            let mut inner = self.inner.lock();
            if inner.session.is_some() {
                debug!("session already active, ignoring quick connect");
                return;
            }
            if inner.pending_quick_connect {
                debug!("quick connect flow already pending");
                return;
            }
            inner.pending_quick_connect = true;
        }

        let launched = self
            .presentation
            .launch(PresentationType::QuickConnect, self.ui_operation_handle());
        if !launched {
            warn!("quick connect presentation refused to launch");
            self.inner.lock().pending_quick_connect = false;
        }
    }

    /// Tear down the active session, if any.
    ///
    /// `purge` also releases the outbound buffer; that part runs whether or
    /// not a session exists. With nothing active and nothing pending this
    /// touches neither the registry nor the presentation. Safe to call
    /// repeatedly.
    #[instrument(skip(self))]
    pub fn terminate_session(&self, purge: bool) {
        let dismiss = {
            let mut inner = self.inner.lock();
            self.terminate_locked(&mut inner, purge)
        };
        for flow in dismiss {
            self.presentation.dismiss(flow);
        }
    }

    /// Teardown under the lock. Returns the flows whose presentation still
    /// needs dismissing; the caller dismisses them after releasing the
    /// lock, because a host's `dismiss` may call back into the
    /// orchestrator.
    fn terminate_locked(&self, inner: &mut Inner, purge: bool) -> Vec<PresentationType> {
        let mut dismiss = Vec::new();
        if let Some(active) = inner.session.take() {
            debug!(session_id = %active.session.descriptor().session_id, "terminating session");
            // Drop the release guard first so the teardown below does not
            // re-enter the orchestrator through it.
            active.session.unregister_status_listener(&active.guard);
            active.session.disconnect();
            self.registry.clear_session();
            dismiss.push(active.session.presentation_type());
        }
        if inner.pending_quick_connect {
            inner.pending_quick_connect = false;
            dismiss.push(PresentationType::QuickConnect);
        }
        if purge {
            inner.buffer.purge();
        }
        dismiss
    }

    // ─── Outbound events ─────────────────────────────────────────────────

    /// Buffer an outbound event and forward it to the active session.
    ///
    /// Dual retention: the buffer keeps its copy even after forwarding, so a
    /// session created later still replays the full pre-session history.
    pub fn queue_event(&self, event: InspectionEvent) {
        let session = {
            let mut inner = self.inner.lock();
            let _ = inner.buffer.append(event.clone());
            inner.session.as_ref().map(|active| active.session.clone())
        };
        if let Some(session) = session {
            session.queue_outbound_event(event);
        }
    }

    /// Whether queued events still have anywhere to go: a live session, or
    /// the buffer ahead of one.
    #[must_use]
    pub fn can_process_sdk_events(&self) -> bool {
        let inner = self.inner.lock();
        inner.buffer.is_active() || inner.session.is_some()
    }

    /// Handle to the active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<Arc<Session>> {
        self.inner.lock().session.as_ref().map(|active| active.session.clone())
    }

    /// Id of the active session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.active_session().map(|session| session.descriptor().session_id.clone())
    }

    // ─── Reconnect and host hooks ────────────────────────────────────────

    /// Try to resume the session recorded by the last successful connect.
    ///
    /// Returns `false` when nothing usable is stored. A valid record
    /// reconnects silently: the stored token rides along, so no PIN UI
    /// appears.
    #[instrument(skip(self))]
    pub fn reconnect_to_stored_session(self: &Arc<Self>) -> bool {
        let Some(url) = self.store.stored_connection_url() else {
            debug!("no stored connection to resume");
            return false;
        };
        let Some(record) = ConnectionRecord::parse(&url) else {
            warn!("stored connection url is unusable, ignoring");
            return false;
        };

        let raw_id = record.session_id.as_str().to_owned();
        let token = record.token.clone();
        match self.create_session(
            &raw_id,
            record.environment,
            Some(&token),
            None,
            PresentationType::Pin,
        ) {
            Ok(()) => {
                info!(session_id = %raw_id, "resuming stored session");
                true
            }
            Err(e) => {
                debug!(category = e.category(), "stored session not resumed: {e}");
                false
            }
        }
    }

    /// The host app moved to the foreground.
    pub fn host_foregrounded(&self) {
        if let Some(session) = self.active_session() {
            session.host_visibility_changed(true);
        }
    }

    /// The host app moved to the background. The session stays up; the
    /// transport only gets a hint.
    pub fn host_backgrounded(&self) {
        if let Some(session) = self.active_session() {
            session.host_visibility_changed(false);
        }
    }

    /// Callback handle for the presentation layer.
    #[must_use]
    pub fn ui_operation_handle(self: &Arc<Self>) -> UiOperationHandle {
        UiOperationHandle { orchestrator: Arc::downgrade(self) }
    }

    /// Release `closed` after it reported `Disconnected`.
    ///
    /// Pointer identity guards against a stale notification from a session
    /// that was already replaced. The buffer survives; only an explicit
    /// purge forgets events.
    fn handle_session_closed(&self, closed: &Arc<Session>) {
        let mut inner = self.inner.lock();
        let is_current = inner
            .session
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.session, closed));
        if !is_current {
            return;
        }
        let _ = inner.session.take();
        self.registry.clear_session();
        drop(inner);

        debug!(session_id = %closed.descriptor().session_id, "session closed, released");
    }
}

/// Internal status listener that releases the active session slot when a
/// session ends on its own (connect failure, send failure, remote close).
struct SessionReleaseGuard {
    orchestrator: Weak<SessionOrchestrator>,
    session: Weak<Session>,
}

impl SessionStatusListener for SessionReleaseGuard {
    fn on_status_changed(&self, status: SessionStatus) {
        if status != SessionStatus::Disconnected {
            return;
        }
        let (Some(orchestrator), Some(session)) =
            (self.orchestrator.upgrade(), self.session.upgrade())
        else {
            return;
        };
        orchestrator.handle_session_closed(&session);
    }
}

/// Presentation-layer callbacks into the orchestrator.
///
/// Holds a weak reference, so a leaked UI never keeps the session layer
/// alive; every method is a silent no-op once the orchestrator is gone.
#[derive(Clone)]
pub struct UiOperationHandle {
    orchestrator: Weak<SessionOrchestrator>,
}

impl UiOperationHandle {
    /// The developer typed a PIN: forward it to the connecting session.
    pub fn on_connect(&self, pin: &str) {
        let Some(orchestrator) = self.orchestrator.upgrade() else { return };
        match orchestrator.active_session() {
            Some(session) => session.connect(Some(pin)),
            None => warn!("pin entered with no session to connect"),
        }
    }

    /// The developer chose disconnect: clear the stored record and tear the
    /// session down. This is the one path that forgets the stored
    /// connection.
    pub fn on_disconnect(&self) {
        let Some(orchestrator) = self.orchestrator.upgrade() else { return };
        debug!("ui disconnect requested");
        if let Err(e) = orchestrator.store.clear_connection_url() {
            warn!("failed to clear stored connection: {e}");
        }
        orchestrator.terminate_session(true);
    }

    /// Device approval granted: open the authorized session.
    pub fn on_quick_connect(&self, session_id: &str, token: &str) {
        let Some(orchestrator) = self.orchestrator.upgrade() else { return };
        let environment = orchestrator.config.environment;
        match orchestrator.create_session(
            session_id,
            environment,
            Some(token),
            None,
            PresentationType::QuickConnect,
        ) {
            Ok(()) => {}
            Err(e) => debug!(category = e.category(), "quick connect approval not applied: {e}"),
        }
    }

    /// The developer dismissed the quick-connect flow without approving.
    pub fn on_cancel(&self) {
        let Some(orchestrator) = self.orchestrator.upgrade() else { return };
        debug!("quick connect flow cancelled");
        orchestrator.inner.lock().pending_quick_connect = false;
        orchestrator.presentation.dismiss(PresentationType::QuickConnect);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
