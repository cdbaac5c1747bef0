//! A single session as an actor.
//!
//! [`Session`] is a cheap handle; the real work happens on a spawned worker
//! task that owns the transport, the pending-event queue, and every status
//! transition. Commands flow in over an unbounded channel and are processed
//! strictly in order, which is what keeps event delivery FIFO across the
//! connect transition.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use spyglass_core::constants::control_type;
use spyglass_core::{InspectionEvent, SessionDescriptor};
use spyglass_store::ConnectionStore;

use crate::plugin::PluginRegistry;
use crate::presentation::PresentationType;
use crate::status::{ListenerSet, SessionStatus, SessionStatusListener};
use crate::transport::{SessionTransport, TransportFactory};

/// Messages handled by the session worker.
enum SessionCommand {
    /// Begin (or resume) the connect flow, optionally with a fresh token.
    Connect(Option<String>),
    /// Send an event now, or hold it until connected.
    Queue(InspectionEvent),
    /// Tear the session down.
    Disconnect,
    /// The host app moved to the foreground (`true`) or background.
    HostVisibility(bool),
}

/// A single pairing attempt with the inspection service.
///
/// Sessions are created by the orchestrator and never restarted: once the
/// status reaches `Disconnected` the worker is gone and the handle only
/// answers status queries. All transitions are emitted from the worker task,
/// so listeners observe one total order.
pub struct Session {
    descriptor: SessionDescriptor,
    presentation_type: PresentationType,
    status: Arc<Mutex<SessionStatus>>,
    listeners: Arc<ListenerSet>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    _worker: JoinHandle<()>,
}

impl Session {
    /// Spawn the worker and hand back the session handle.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn launch(
        descriptor: SessionDescriptor,
        presentation_type: PresentationType,
        service_domain: String,
        transports: &dyn TransportFactory,
        store: Arc<dyn ConnectionStore>,
        plugins: Arc<PluginRegistry>,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let transport = transports.create_transport(&descriptor, inbound_tx.clone());

        let status = Arc::new(Mutex::new(SessionStatus::Idle));
        let listeners = Arc::new(ListenerSet::new());
        let cancel = CancellationToken::new();

        let worker = SessionWorker {
            descriptor: descriptor.clone(),
            service_domain,
            transport,
            store,
            plugins,
            status: status.clone(),
            listeners: listeners.clone(),
            cancel: cancel.clone(),
            cmd_rx,
            inbound_rx,
            _inbound_guard: inbound_tx,
            pending: VecDeque::new(),
        };
        let handle = tokio::spawn(worker.run());

        Arc::new(Self {
            descriptor,
            presentation_type,
            status,
            listeners,
            cmd_tx,
            cancel,
            _worker: handle,
        })
    }

    /// Descriptor this session was created from.
    #[must_use]
    pub fn descriptor(&self) -> &SessionDescriptor {
        &self.descriptor
    }

    /// Authorization flow this session belongs to.
    #[must_use]
    pub fn presentation_type(&self) -> PresentationType {
        self.presentation_type
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Kick off the connect flow.
    ///
    /// `pin` overrides the descriptor token (a UI-entered PIN); with neither
    /// the session parks in `Authorizing` until a token arrives.
    pub fn connect(&self, pin: Option<&str>) {
        let _ = self.cmd_tx.send(SessionCommand::Connect(pin.map(str::to_owned)));
    }

    /// Queue an outbound event: sent immediately when connected, held in
    /// arrival order otherwise.
    pub fn queue_outbound_event(&self, event: InspectionEvent) {
        if self.cmd_tx.send(SessionCommand::Queue(event)).is_err() {
            debug!("session worker gone, dropping outbound event");
        }
    }

    /// Tear the session down. Idempotent and non-blocking; cancellation also
    /// covers a connect still in flight.
    pub fn disconnect(&self) {
        self.cancel.cancel();
        let _ = self.cmd_tx.send(SessionCommand::Disconnect);
    }

    /// Forward a host visibility change to the transport.
    pub fn host_visibility_changed(&self, foreground: bool) {
        let _ = self.cmd_tx.send(SessionCommand::HostVisibility(foreground));
    }

    /// Register a status listener, deduped by `Arc` pointer identity.
    pub fn register_status_listener(&self, listener: Arc<dyn SessionStatusListener>) {
        self.listeners.register(listener);
    }

    /// Remove a previously registered status listener.
    pub fn unregister_status_listener(&self, listener: &Arc<dyn SessionStatusListener>) {
        self.listeners.unregister(listener);
    }
}

/// Owns the transport and drives all state transitions.
struct SessionWorker {
    descriptor: SessionDescriptor,
    service_domain: String,
    transport: Arc<dyn SessionTransport>,
    store: Arc<dyn ConnectionStore>,
    plugins: Arc<PluginRegistry>,
    status: Arc<Mutex<SessionStatus>>,
    listeners: Arc<ListenerSet>,
    cancel: CancellationToken,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    inbound_rx: mpsc::UnboundedReceiver<InspectionEvent>,
    // Keeps the inbound channel open even if the transport drops its sender.
    _inbound_guard: mpsc::UnboundedSender<InspectionEvent>,
    pending: VecDeque<InspectionEvent>,
}

impl SessionWorker {
    async fn run(mut self) {
        enum Step {
            Command(Option<SessionCommand>),
            Inbound(InspectionEvent),
            Cancelled,
        }

        loop {
            let step = tokio::select! {
                cmd = self.cmd_rx.recv() => Step::Command(cmd),
                Some(event) = self.inbound_rx.recv() => Step::Inbound(event),
                () = self.cancel.cancelled() => Step::Cancelled,
            };
            let keep_going = match step {
                Step::Command(Some(cmd)) => self.handle_command(cmd).await,
                Step::Command(None) | Step::Cancelled => {
                    self.finish().await;
                    false
                }
                Step::Inbound(event) => self.handle_inbound(event).await,
            };
            if !keep_going {
                break;
            }
        }
        debug!(session_id = %self.descriptor.session_id, "session worker stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Connect(pin) => self.handle_connect(pin).await,
            SessionCommand::Queue(event) => self.handle_queue(event).await,
            SessionCommand::Disconnect => {
                self.finish().await;
                false
            }
            SessionCommand::HostVisibility(foreground) => {
                self.transport.host_visibility_changed(foreground);
                true
            }
        }
    }

    async fn handle_connect(&mut self, pin: Option<String>) -> bool {
        match self.current_status() {
            SessionStatus::Idle | SessionStatus::Authorizing => {}
            SessionStatus::Connected => return true,
            SessionStatus::Disconnected => return false,
        }
        self.set_status(SessionStatus::Authorizing);

        let Some(token) = pin.or_else(|| self.descriptor.token.clone()) else {
            debug!(session_id = %self.descriptor.session_id, "no token yet, waiting for pin entry");
            return true;
        };

        let url = self.descriptor.connect_url(&self.service_domain, &token);
        let transport = self.transport.clone();
        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            result = transport.connect(&url) => Some(result),
            () = cancel.cancelled() => None,
        };

        match outcome {
            Some(Ok(())) if !self.cancel.is_cancelled() => {
                self.set_status(SessionStatus::Connected);
                if let Err(e) = self.store.save_connection_url(&url) {
                    warn!("failed to persist connection url: {e}");
                }
                self.plugins.notify_connected();
                self.flush_pending().await
            }
            Some(Err(e)) => {
                warn!(session_id = %self.descriptor.session_id, "connect failed: {e}");
                self.set_status(SessionStatus::Disconnected);
                false
            }
            // Torn down while the connect was in flight or completing: the
            // late success must never surface as Connected.
            None | Some(Ok(())) => {
                self.finish().await;
                false
            }
        }
    }

    async fn handle_queue(&mut self, event: InspectionEvent) -> bool {
        if self.current_status() == SessionStatus::Connected {
            self.send_event(&event).await
        } else {
            self.pending.push_back(event);
            true
        }
    }

    /// Drain the pending queue in arrival order.
    async fn flush_pending(&mut self) -> bool {
        while let Some(event) = self.pending.pop_front() {
            if !self.send_event(&event).await {
                return false;
            }
        }
        true
    }

    async fn send_event(&mut self, event: &InspectionEvent) -> bool {
        match self.transport.send(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %self.descriptor.session_id, "send failed: {e}");
                self.finish().await;
                false
            }
        }
    }

    async fn handle_inbound(&mut self, event: InspectionEvent) -> bool {
        if event.is_control() && event.control_type() == Some(control_type::DISCONNECT) {
            debug!(session_id = %self.descriptor.session_id, "service requested disconnect");
            self.finish().await;
            return false;
        }
        self.plugins.dispatch(&event);
        true
    }

    /// Final teardown: transport closed, plugins told, `Disconnected` emitted.
    /// Safe to reach from any state.
    async fn finish(&mut self) {
        let was_connected = self.current_status() == SessionStatus::Connected;
        self.transport.disconnect().await;
        if was_connected {
            self.plugins.notify_disconnected();
        }
        self.set_status(SessionStatus::Disconnected);
    }

    fn current_status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Record a transition and notify listeners. No-op if unchanged.
    fn set_status(&self, next: SessionStatus) {
        {
            let mut status = self.status.lock();
            if *status == next {
                return;
            }
            *status = next;
        }
        debug!(session_id = %self.descriptor.session_id, status = %next, "session status changed");
        self.listeners.notify(next);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
