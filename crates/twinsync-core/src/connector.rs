// ── Connector ──
//
// Connection lifecycle for one notification endpoint. A single supervisor
// task runs connect → session → reconnect delay in sequence, so there is
// never more than one live connection or one pending delay. Every attempt
// gets an epoch; `stop()` bumps it, and anything that completes under an
// old epoch is dropped instead of installed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use twinsync_api::{
    CredentialProvider, MessageSink, Request, Session, Transport, WebSocketTransport,
    notification_url, redacted,
};

use crate::config::ConnectorConfig;
use crate::error::CoreError;
use crate::mirror::TwinMirror;
use crate::model::Snapshot;
use crate::store::StateStore;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection lifecycle observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `start()` not called yet.
    Idle,
    /// Fetching a token or performing the handshake.
    Connecting,
    /// Session open; notifications flowing.
    Connected,
    /// Connection lost or attempt failed; waiting out the reconnect delay.
    Disconnected,
    /// `stop()` was called. Terminal.
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        })
    }
}

// ── Connector ────────────────────────────────────────────────────

/// Keeps a [`StateStore`] in sync with the children of one root twin.
///
/// Cheaply cloneable via `Arc<ConnectorInner>`. Collaborators are injected:
/// the credential provider, the transport, and optionally the store.
/// Call [`start()`](Self::start) from within a Tokio runtime (outside one
/// it logs and does nothing) and [`stop()`](Self::stop) when done; a started connector keeps running
/// until stopped, even if every handle is dropped.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    config: ConnectorConfig,
    credentials: Arc<dyn CredentialProvider>,
    transport: Arc<dyn Transport>,
    store: Arc<StateStore>,
    state: watch::Sender<ConnectionState>,
    link: ArcSwapOption<Link>,
    epoch: AtomicU64,
    pending: AtomicBool,
    started: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Outbound side of the session installed under `epoch`.
struct Link {
    epoch: u64,
    sink: MessageSink,
}

impl Connector {
    /// Create a connector with its own empty [`StateStore`]. Does NOT
    /// connect; call [`start()`](Self::start).
    pub fn new(
        config: ConnectorConfig,
        credentials: Arc<dyn CredentialProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        Self::with_store(config, credentials, transport, Arc::new(StateStore::new()))
    }

    /// Create a connector over the websocket transport described by
    /// `config.transport`.
    pub fn websocket(
        config: ConnectorConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, CoreError> {
        let transport = Arc::new(WebSocketTransport::new(config.transport.clone()));
        Self::new(config, credentials, transport)
    }

    /// Create a connector that publishes into an existing store.
    pub fn with_store(
        config: ConnectorConfig,
        credentials: Arc<dyn CredentialProvider>,
        transport: Arc<dyn Transport>,
        store: Arc<StateStore>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Idle);

        Ok(Self {
            inner: Arc::new(ConnectorInner {
                config,
                credentials,
                transport,
                store,
                state,
                link: ArcSwapOption::empty(),
                epoch: AtomicU64::new(0),
                pending: AtomicBool::new(false),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    /// The store this connector publishes into.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    /// Shorthand for `store().current()`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.current()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the supervisor task on the current Tokio runtime. No-op if
    /// already started or stopped, or if called outside a runtime.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled() {
            debug!("start ignored: connector already stopped");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("start ignored: no Tokio runtime on this thread");
            return;
        };
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("start ignored: connector already running");
            return;
        }

        let handle = runtime.spawn(supervise(Arc::clone(&self.inner)));
        *self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Stop for good.
    ///
    /// Cancels a pending reconnect delay or in-flight connect attempt,
    /// closes the live connection, and waits for the supervisor to exit.
    /// Idempotent; the connector cannot be restarted.
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.link.store(None);
        inner.pending.store(false, Ordering::SeqCst);
        inner.state.send_replace(ConnectionState::Stopped);

        let handle = inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "connector supervisor ended abnormally");
            }
            info!("connector stopped");
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Fire-and-forget send on the current connection.
    ///
    /// Without an established connection the request is dropped silently;
    /// subscriptions are rebuilt in full after every reconnect anyway.
    /// Returns whether the request was handed to a live connection. Safe to
    /// call from any thread.
    pub fn send(&self, request: &Request) -> bool {
        let guard = self.inner.link.load();
        let Some(link) = guard.as_ref() else {
            trace!(thing = request.thing(), "not connected, request dropped");
            return false;
        };
        if link.epoch != self.inner.epoch.load(Ordering::SeqCst) {
            trace!(thing = request.thing(), "connection superseded, request dropped");
            return false;
        }

        match request.encode() {
            Ok(text) => link.sink.send_text(text),
            Err(e) => {
                warn!(error = %e, thing = request.thing(), "cannot encode request");
                false
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────

    /// `true` unless a connect attempt or reconnect delay is pending.
    ///
    /// This is a liveness hint, not "has an open socket": it is also `true`
    /// before [`start()`](Self::start) and after [`stop()`](Self::stop).
    /// Use [`state()`](Self::state) or
    /// [`connection_state()`](Self::connection_state) for the real lifecycle.
    pub fn is_connected(&self) -> bool {
        self.inner.cancel.is_cancelled() || !self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("application", &self.inner.config.application)
            .field("root", &self.inner.config.root_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Supervisor ───────────────────────────────────────────────────

/// Main loop: connect → run session → clear mirror → delay → reconnect.
async fn supervise(inner: Arc<ConnectorInner>) {
    let config = &inner.config;
    let mut mirror = TwinMirror::new(
        config.root_id.clone(),
        config.child_suffix.clone(),
        Arc::clone(&inner.store),
    );
    let mut attempt: u32 = 0;

    info!(
        application = %config.application,
        root = %config.root_id,
        "connector started"
    );

    loop {
        let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        inner.pending.store(true, Ordering::SeqCst);
        inner.transition(epoch, ConnectionState::Connecting);

        let outcome = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            outcome = inner.connect() => outcome,
        };

        match outcome {
            Ok(session) if inner.is_current(epoch) => {
                attempt = 0;
                inner.run_session(epoch, session, &mut mirror).await;
            }
            Ok(_stale) => {
                debug!(epoch, "dropping connection that completed after stop");
                break;
            }
            Err(e) => {
                warn!(error = %e, epoch, attempt, "connection attempt failed");
                inner.credentials.invalidate().await;
            }
        }

        mirror.on_disconnected();
        if inner.cancel.is_cancelled() {
            break;
        }

        let delay = config.reconnect.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        inner.pending.store(true, Ordering::SeqCst);
        inner.transition(epoch, ConnectionState::Disconnected);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    if !mirror.is_empty() {
        mirror.on_disconnected();
    }
    debug!("connector supervisor exiting");
}

impl ConnectorInner {
    fn is_current(&self, epoch: u64) -> bool {
        !self.cancel.is_cancelled() && self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Move to `next` unless `epoch` is stale or the connector stopped.
    /// The check runs under the watch lock, so it can't race `stop()`.
    fn transition(&self, epoch: u64, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Stopped
                || *state == next
                || self.epoch.load(Ordering::SeqCst) != epoch
            {
                return false;
            }
            debug!(from = %state, to = %next, epoch, "connection state changed");
            *state = next;
            true
        });
    }

    /// Fresh token → URL → handshake. Any failure is a failed attempt.
    async fn connect(&self) -> Result<Session, twinsync_api::Error> {
        let token = self.credentials.access_token().await?;
        let url = notification_url(&self.config.api_url, &self.config.application, &token)?;
        debug!(url = %redacted(&url), "connecting");
        self.transport.open(&url).await
    }

    /// Install the session's link, resubscribe the root, and feed frames to
    /// the mirror until the remote closes or the connector stops.
    async fn run_session(&self, epoch: u64, mut session: Session, mirror: &mut TwinMirror) {
        let sink = session.sender();
        self.link.store(Some(Arc::new(Link {
            epoch,
            sink: sink.clone(),
        })));
        self.pending.store(false, Ordering::SeqCst);
        self.transition(epoch, ConnectionState::Connected);
        info!(epoch, "connected");

        mirror.resubscribe_root(&sink);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                frame = session.recv() => {
                    let Some(text) = frame else {
                        info!(epoch, "connection closed by remote");
                        break;
                    };
                    mirror.on_message(&text, &sink);
                }
            }
        }

        self.clear_link(epoch);
    }

    /// Remove the link only if it still belongs to `epoch`.
    fn clear_link(&self, epoch: u64) {
        self.link.rcu(|current| match current {
            Some(link) if link.epoch == epoch => None,
            other => other.clone(),
        });
    }
}
