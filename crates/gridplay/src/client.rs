//! `GridPlayClient` builder and the process-wide shared client.
//!
//! This is the entry point for a game UI. It ties the layers together:
//! transport → protocol → session → match.

use std::sync::Arc;
use std::time::Duration;

use gridplay_match::{
    Diagnostic, MatchConfig, MatchHandle, ProposalId, Snapshot, attach,
};
use gridplay_session::{ReconnectPolicy, Session, SessionConfig, SessionError, SessionState};
use gridplay_transport::WebSocketConnector;
use serde_json::Value;
use tokio::sync::{OnceCell, broadcast, watch};
use tokio::task::JoinHandle;

use crate::GridPlayError;

/// The session type used by [`GridPlayClient`].
pub type WebSocketSession = Session<WebSocketConnector>;

/// The one client shared by everything in the process.
static SHARED: OnceCell<GridPlayClient> = OnceCell::const_new();

// ---------------------------------------------------------------------------
// GridPlayClientBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and connecting a [`GridPlayClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use gridplay::prelude::*;
///
/// # async fn run() -> Result<(), GridPlayError> {
/// let client = GridPlayClient::builder()
///     .endpoint("ws://127.0.0.1:4000/ws")
///     .proposal_timeout(Duration::from_secs(10))
///     .connect()
///     .await?;
/// println!("{}", client.current().last_status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GridPlayClientBuilder {
    session: SessionConfig,
    game: MatchConfig,
}

impl GridPlayClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server URL.
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.session.endpoint = url.into();
        self
    }

    /// Replaces the whole session configuration.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Replaces the whole match configuration.
    #[must_use]
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.game = config;
        self
    }

    /// Sets the reconnection policy. Reconnection is off by default.
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.session.reconnect = policy;
        self
    }

    /// Treats a proposal as denied (reason `"timeout"`) if no verdict
    /// arrives within `timeout`.
    #[must_use]
    pub fn proposal_timeout(mut self, timeout: Duration) -> Self {
        self.game.proposal_timeout = Some(timeout);
        self
    }

    /// Whether Ctrl-C closes the connection. On by default.
    ///
    /// Installing the hook replaces the default Ctrl-C behavior of
    /// terminating the process; the application should exit once the
    /// client reports it is closed.
    #[must_use]
    pub fn close_on_interrupt(mut self, enabled: bool) -> Self {
        self.session.close_on_interrupt = enabled;
        self
    }

    /// Starts connecting in the background and returns immediately.
    ///
    /// Must be called within a Tokio runtime.
    pub fn build(self) -> Result<GridPlayClient, GridPlayError> {
        let session = Session::new(self.session, WebSocketConnector);
        let game = attach(&session, self.game);
        if session.config().close_on_interrupt {
            install_exit_hook(&session);
        }
        session.start()?;

        Ok(GridPlayClient {
            inner: Arc::new(ClientInner { session, game }),
        })
    }

    /// Connects and waits for the first attempt to resolve.
    ///
    /// # Errors
    /// Returns [`SessionError::NotConnected`] (wrapped) with the status
    /// text if the session closed without ever opening.
    pub async fn connect(self) -> Result<GridPlayClient, GridPlayError> {
        let client = self.build()?;
        let settled = client.inner.session.wait_settled().await;
        match settled {
            SessionState::Closed { status } => Err(SessionError::NotConnected(status).into()),
            _ => Ok(client),
        }
    }
}

/// Closes the session on Ctrl-C. The listener ends as soon as the
/// session is closed by any other path.
fn install_exit_hook(session: &Arc<WebSocketSession>) -> JoinHandle<()> {
    let mut state = session.subscribe_state();
    let session = Arc::downgrade(session);
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "cannot listen for interrupt");
                    return;
                }
                if let Some(session) = session.upgrade() {
                    tracing::info!("interrupted, closing connection");
                    session.close().await;
                }
            }
            () = async {
                let _ = state.wait_for(SessionState::is_terminal).await;
            } => {
                tracing::debug!("session closed, interrupt hook removed");
            }
        }
    })
}

// ---------------------------------------------------------------------------
// GridPlayClient
// ---------------------------------------------------------------------------

/// A connected game client.
///
/// Cheap to clone; every clone drives the same connection and match.
/// When the last clone is dropped the connection is closed.
#[derive(Clone)]
pub struct GridPlayClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    session: Arc<WebSocketSession>,
    game: MatchHandle,
}

/// Closes the connection when the last client handle goes away.
///
/// `Drop` is synchronous, so the close runs as a spawned task.
impl Drop for ClientInner {
    fn drop(&mut self) {
        if self.session.state().is_terminal() {
            return;
        }
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { session.close().await });
            }
            Err(_) => tracing::debug!("client dropped outside a runtime, connection left to the OS"),
        }
    }
}

impl GridPlayClient {
    /// Creates a new builder.
    pub fn builder() -> GridPlayClientBuilder {
        GridPlayClientBuilder::new()
    }

    /// Returns the process-wide client, connecting it with default
    /// settings on first use.
    ///
    /// See [`shared_with`](Self::shared_with).
    pub async fn shared() -> Result<GridPlayClient, GridPlayError> {
        Self::shared_with(GridPlayClientBuilder::new()).await
    }

    /// Returns the process-wide client, connecting it with `builder` on
    /// first use.
    ///
    /// Every later call gets the same client and `builder` is ignored. If
    /// the first connection fails nothing is stored, so the next call
    /// tries again.
    pub async fn shared_with(builder: GridPlayClientBuilder) -> Result<GridPlayClient, GridPlayError> {
        SHARED.get_or_try_init(|| builder.connect()).await.cloned()
    }

    /// Returns `true` if both handles drive the same connection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Proposes a game action. See
    /// [`MatchHandle::propose_action`](gridplay_match::MatchHandle::propose_action).
    pub async fn propose_action(&self, payload: Value) -> Result<ProposalId, GridPlayError> {
        Ok(self.inner.game.propose_action(payload).await?)
    }

    /// Returns to waiting for a match after the game has ended.
    pub async fn reset(&self) -> Result<(), GridPlayError> {
        Ok(self.inner.game.reset().await?)
    }

    /// Reads the match state after everything queued so far.
    pub async fn snapshot(&self) -> Result<Snapshot, GridPlayError> {
        Ok(self.inner.game.snapshot().await?)
    }

    /// The latest published match state.
    pub fn current(&self) -> Snapshot {
        self.inner.game.current()
    }

    /// Watches match state changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.game.subscribe()
    }

    /// Subscribes to desync and drop diagnostics.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.inner.game.diagnostics()
    }

    /// The connection state.
    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// The connection's user-facing status line.
    pub fn connection_status(&self) -> String {
        self.inner.session.status()
    }

    /// The server URL.
    pub fn endpoint(&self) -> &str {
        &self.inner.session.config().endpoint
    }

    /// Closes the connection. The client stays usable for reading state;
    /// proposals fail with `NotConnected` from now on.
    pub async fn close(&self) {
        self.inner.session.close().await;
    }
}
