//! The session: sole owner of the connection to the game server.
//!
//! A [`Session`] dials the configured endpoint, decodes every inbound
//! frame with its [`Codec`], and hands the result to the single
//! registered event handler. It also owns the outbound path: callers
//! [`send`](Session::send) typed messages and the session refuses them
//! unless the connection is open.
//!
//! All connection work happens on one background task started by
//! [`Session::start`]:
//!
//! ```text
//!   connect ──→ read frames ──→ (closed) ──→ retry? ──yes──→ connect ...
//!                                               │
//!                                               no
//!                                               ▼
//!                                            Closed (terminal)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gridplay_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
use gridplay_transport::{CLOSE_NORMAL, CloseInfo, Connection, Connector, Incoming, TransportError};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use crate::state::close_status;
use crate::{SessionConfig, SessionError, SessionState};

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// Everything the session reports to its event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection is open. Sent again after every successful reconnect.
    Opened,

    /// A decoded server message.
    Message(ServerMessage),

    /// A connection attempt or an open connection failed.
    Error(String),

    /// The connection dropped and retry number `attempt` will start after
    /// `delay`.
    Reconnecting { attempt: u32, delay: Duration },

    /// The session is closed for good. No events follow this one.
    Closed(CloseInfo),
}

type Handler = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// How one connection attempt ended.
enum Dial<T> {
    Open(Arc<T>),
    Failed(String),
    Shutdown,
}

/// Why the read loop stopped.
enum ReadEnd {
    Shutdown,
    Closed(CloseInfo),
    Failed(TransportError),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One logical connection to the game server.
///
/// Shared as `Arc<Session>`: the background task holds one reference,
/// callers hold the others.
///
/// ## Single handler
///
/// There is exactly one event handler slot. [`on_event`](Self::on_event)
/// replaces whatever was registered before; events that arrive while no
/// handler is registered are dropped. Fan-out to several consumers
/// belongs a layer up.
pub struct Session<K: Connector, C: Codec = JsonCodec> {
    config: SessionConfig,
    connector: K,
    codec: C,
    handler: Mutex<Option<Handler>>,
    /// The open connection, if any. Only the background task sets it.
    connection: Mutex<Option<Arc<K::Connection>>>,
    state: watch::Sender<SessionState>,
    started: AtomicBool,
    closing: AtomicBool,
    shutdown: Notify,
}

impl<K: Connector> Session<K> {
    /// Creates a session that speaks JSON over `connector`.
    ///
    /// Nothing is dialed until [`start`](Self::start) is called, which
    /// gives the caller a chance to register a handler first.
    pub fn new(config: SessionConfig, connector: K) -> Arc<Self> {
        Self::with_codec(config, connector, JsonCodec)
    }
}

impl<K: Connector, C: Codec> Session<K, C> {
    /// Creates a session with a custom codec.
    pub fn with_codec(config: SessionConfig, connector: K, codec: C) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Connecting);
        Arc::new(Self {
            config,
            connector,
            codec,
            handler: Mutex::new(None),
            connection: Mutex::new(None),
            state,
            started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The user-facing status line for the current state.
    pub fn status(&self) -> String {
        self.state.borrow().status()
    }

    /// Returns `true` if messages can be sent right now.
    pub fn is_open(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Watches state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Waits until the first connection attempt has resolved, then
    /// returns the state at that moment (`Open`, `Reconnecting`, or
    /// `Closed`).
    pub async fn wait_settled(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Registers the event handler, replacing any previous one.
    ///
    /// Returns `true` if a handler was replaced. The handler runs on the
    /// session's reader task, so it should hand work off rather than
    /// block.
    pub fn on_event<F>(&self, handler: F) -> bool
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        let replaced = self.handler.lock().replace(Arc::new(handler)).is_some();
        if replaced {
            tracing::debug!("session event handler replaced");
        }
        replaced
    }

    /// Starts the background connection task.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyStarted`] on the second call, or if
    /// the session was closed before it was ever started.
    pub fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyStarted);
        }
        tracing::info!(endpoint = %self.config.endpoint, "session starting");
        tokio::spawn(Arc::clone(self).run());
        Ok(())
    }

    /// Encodes and sends one message.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] unless the session is `Open`.
    ///   Nothing is queued for later.
    /// - [`SessionError::Protocol`] if the message can't be encoded
    /// - [`SessionError::Transport`] if the write fails
    pub async fn send(&self, msg: &ClientMessage) -> Result<(), SessionError> {
        let conn = {
            let state = self.state.borrow();
            if !state.is_open() {
                return Err(SessionError::NotConnected(state.status()));
            }
            self.connection.lock().clone()
        };
        let Some(conn) = conn else {
            return Err(SessionError::NotConnected(self.status()));
        };

        let bytes = self.codec.encode(msg)?;
        conn.send(&bytes).await?;
        tracing::debug!(conn_id = %conn.id(), kind = %msg.kind(), "message sent");
        Ok(())
    }

    /// Closes the connection and marks the session terminal.
    ///
    /// Waits until the background task has finished. Safe to call more
    /// than once and from any state.
    pub async fn close(&self) {
        self.closing.store(true, Ordering::Release);
        if !self.started.swap(true, Ordering::AcqRel) {
            // Never started: no task to stop.
            self.finish(CloseInfo::new(CLOSE_NORMAL, ""));
            return;
        }
        self.shutdown.notify_one();
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(SessionState::is_terminal).await;
    }

    // -----------------------------------------------------------------------
    // Background task
    // -----------------------------------------------------------------------

    async fn run(self: Arc<Self>) {
        let policy = self.config.reconnect.clone();
        let mut attempt = 0u32;

        loop {
            if self.closing.load(Ordering::Acquire) {
                self.finish(CloseInfo::new(CLOSE_NORMAL, ""));
                return;
            }

            let info = match self.dial().await {
                Dial::Shutdown => {
                    self.finish(CloseInfo::new(CLOSE_NORMAL, ""));
                    return;
                }
                Dial::Failed(message) => {
                    self.emit(SessionEvent::Error(message));
                    CloseInfo::abnormal()
                }
                Dial::Open(conn) => {
                    attempt = 0;
                    match self.serve(conn).await {
                        ReadEnd::Shutdown => {
                            self.finish(CloseInfo::new(CLOSE_NORMAL, ""));
                            return;
                        }
                        ReadEnd::Closed(info) => info,
                        ReadEnd::Failed(e) => {
                            tracing::warn!(error = %e, "connection failed");
                            self.emit(SessionEvent::Error(e.to_string()));
                            CloseInfo::abnormal()
                        }
                    }
                }
            };

            // A normal close is the server ending the session on purpose.
            attempt += 1;
            if info.code == CLOSE_NORMAL
                || attempt > policy.max_attempts
                || self.closing.load(Ordering::Acquire)
            {
                self.finish(info);
                return;
            }

            let delay = policy.delay_for(attempt);
            tracing::warn!(attempt, ?delay, %info, "connection lost, reconnecting");
            self.state.send_replace(SessionState::Reconnecting { attempt });
            self.emit(SessionEvent::Reconnecting { attempt, delay });

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.finish(CloseInfo::new(CLOSE_NORMAL, ""));
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn dial(&self) -> Dial<K::Connection> {
        let endpoint = self.config.endpoint.as_str();
        let timeout = self.config.connect_timeout;

        let result = tokio::select! {
            _ = self.shutdown.notified() => return Dial::Shutdown,
            result = tokio::time::timeout(timeout, self.connector.connect(endpoint)) => result,
        };

        match result {
            Ok(Ok(conn)) => Dial::Open(Arc::new(conn)),
            Ok(Err(e)) => {
                tracing::warn!(endpoint, error = %e, "connect failed");
                Dial::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(endpoint, ?timeout, "connect timed out");
                Dial::Failed(format!("connect to {endpoint} timed out"))
            }
        }
    }

    /// Publishes `conn` as the open connection and reads from it until
    /// it ends.
    async fn serve(&self, conn: Arc<K::Connection>) -> ReadEnd {
        let conn_id = conn.id();
        *self.connection.lock() = Some(Arc::clone(&conn));
        self.state.send_replace(SessionState::Open);
        tracing::info!(%conn_id, endpoint = %self.config.endpoint, "connected");
        self.emit(SessionEvent::Opened);

        let end = self.read_loop(&conn).await;
        self.connection.lock().take();

        if matches!(end, ReadEnd::Shutdown) {
            if let Err(e) = conn.close().await {
                tracing::debug!(%conn_id, error = %e, "close handshake failed");
            }
        }
        end
    }

    async fn read_loop(&self, conn: &K::Connection) -> ReadEnd {
        let conn_id = conn.id();
        loop {
            let incoming = tokio::select! {
                _ = self.shutdown.notified() => return ReadEnd::Shutdown,
                incoming = conn.recv() => incoming,
            };

            match incoming {
                Ok(Incoming::Frame(bytes)) => match self.codec.decode::<ServerMessage>(&bytes) {
                    Ok(msg) => {
                        tracing::debug!(%conn_id, kind = ?msg.kind(), "message received");
                        self.emit(SessionEvent::Message(msg));
                    }
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "dropping undecodable frame");
                    }
                },
                Ok(Incoming::Closed(info)) => {
                    tracing::info!(%conn_id, %info, "connection closed by server");
                    return ReadEnd::Closed(info);
                }
                Err(e) => return ReadEnd::Failed(e),
            }
        }
    }

    fn finish(&self, info: CloseInfo) {
        let status = close_status(&info);
        tracing::info!(%info, %status, "session closed");
        self.state.send_replace(SessionState::Closed { status });
        self.emit(SessionEvent::Closed(info));
    }

    fn emit(&self, event: SessionEvent) {
        // Call outside the lock so the handler may re-register itself.
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler(event),
            None => tracing::debug!(?event, "no session event handler, dropping event"),
        }
    }
}
