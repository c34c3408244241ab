//! Match actor: an isolated Tokio task that owns the [`MatchState`].
//!
//! Session events and caller commands both land in this one task and are
//! handled one at a time, to completion. That is the only thing that
//! makes "propose, then await the verdict" safe: a verdict can never be
//! applied halfway through recording the proposal it answers.
//!
//! ```text
//!   Session handler ──SessionEvent──┐
//!                                   ▼
//!   MatchHandle ──MatchCommand──→ MatchActor ──Snapshot──→ watch subscribers
//!                                   │        ──Diagnostic─→ broadcast subscribers
//!                                   ▼
//!                              ProposalSink (Session)
//! ```

use std::future;
use std::sync::Arc;
use std::time::Duration;

use gridplay_protocol::{ClientMessage, Codec};
use gridplay_session::{Session, SessionError, SessionEvent, SessionState};
use gridplay_transport::Connector;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};

use crate::{
    Diagnostic, MatchConfig, MatchError, MatchState, ProposalId, ProposalSink, Snapshot, dispatch,
};

/// How many diagnostics a slow subscriber may fall behind by.
const DIAGNOSTIC_CAPACITY: usize = 64;

/// Commands sent to the match actor through its channel.
pub(crate) enum MatchCommand {
    /// Send a proposal and record it as pending.
    Propose {
        payload: Value,
        reply: oneshot::Sender<Result<ProposalId, MatchError>>,
    },

    /// Leave `Ended` for a rematch.
    Reset {
        reply: oneshot::Sender<Result<(), MatchError>>,
    },

    /// Read the state after everything queued before this command.
    Snapshot { reply: oneshot::Sender<Snapshot> },

    /// Stop the actor.
    Shutdown,
}

/// A proposal write that finished on its own task.
struct Submitted {
    id: ProposalId,
    result: Result<(), SessionError>,
    reply: oneshot::Sender<Result<ProposalId, MatchError>>,
}

// ---------------------------------------------------------------------------
// MatchHandle
// ---------------------------------------------------------------------------

/// Handle to a running match actor.
///
/// Cheap to clone. The actor stops when the last handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct MatchHandle {
    commands: mpsc::Sender<MatchCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<Snapshot>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl MatchHandle {
    /// Proposes a game action.
    ///
    /// On success the proposal has been sent and is pending; its verdict
    /// arrives later through the snapshot (`pending` clears and
    /// `last_outcome` is set).
    ///
    /// The proposal is pending from the moment it passes validation. The
    /// write itself runs off the actor, so a slow socket delays only
    /// this call: other proposals are refused at once, and verdicts and
    /// timeouts keep being applied.
    ///
    /// # Errors
    /// - [`MatchError::ProposalAlreadyPending`]: nothing was sent
    /// - [`MatchError::NotActive`]: no match in progress
    /// - [`MatchError::Session`]: the session refused or failed the send;
    ///   the pending proposal is dropped again
    /// - [`MatchError::Unavailable`]: the actor has stopped
    pub async fn propose_action(&self, payload: Value) -> Result<ProposalId, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.request(MatchCommand::Propose { payload, reply }, rx).await?
    }

    /// Returns to `AwaitingMatch` after the game has ended.
    ///
    /// # Errors
    /// Returns [`MatchError::InvalidTransition`] unless the phase is
    /// `Ended`.
    pub async fn reset(&self) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.request(MatchCommand::Reset { reply }, rx).await?
    }

    /// Reads the state once every previously queued command has been
    /// handled.
    pub async fn snapshot(&self) -> Result<Snapshot, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.request(MatchCommand::Snapshot { reply }, rx).await
    }

    /// The most recently published snapshot, without a round trip.
    pub fn current(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Watches snapshot changes. Every receiver sees the latest state;
    /// intermediate states may be skipped.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Subscribes to diagnostics raised from now on.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Feeds a session event to the actor. Returns `false` if the actor
    /// has stopped.
    pub fn deliver(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), MatchError> {
        self.commands
            .send(MatchCommand::Shutdown)
            .await
            .map_err(|_| MatchError::Unavailable)
    }

    async fn request<T>(
        &self,
        cmd: MatchCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, MatchError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| MatchError::Unavailable)?;
        rx.await.map_err(|_| MatchError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawns a match actor that sends proposals through `sink`.
///
/// Session events must be fed in with [`MatchHandle::deliver`]; use
/// [`attach`] to wire a [`Session`] up directly.
pub fn spawn_match<S: ProposalSink>(config: MatchConfig, sink: Arc<S>) -> MatchHandle {
    spawn_with_state(config, sink, SessionState::Connecting)
}

/// Spawns a match actor for `session` and registers it as the session's
/// event handler.
///
/// Call this before [`Session::start`] so the actor sees the first
/// `Opened` event. Replaces any handler already registered.
pub fn attach<K: Connector, C: Codec>(
    session: &Arc<Session<K, C>>,
    config: MatchConfig,
) -> MatchHandle {
    let handle = spawn_with_state(config, Arc::clone(session), session.state());
    let events = handle.events.clone();
    session.on_event(move |event| {
        // The actor may already be gone during teardown.
        let _ = events.send(event);
    });
    handle
}

fn spawn_with_state<S: ProposalSink>(
    config: MatchConfig,
    sink: Arc<S>,
    connection: SessionState,
) -> MatchHandle {
    let state = MatchState::new(config.initial_position.clone()).with_connection(connection);
    let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots_rx) = watch::channel(state.snapshot());
    let (diagnostics_tx, _) = broadcast::channel(DIAGNOSTIC_CAPACITY);
    let (submitted_tx, submitted_rx) = mpsc::unbounded_channel();

    let actor = MatchActor {
        state,
        sink,
        proposal_timeout: config.proposal_timeout,
        deadline: None,
        commands: commands_rx,
        events: events_rx,
        submitted_tx,
        submitted: submitted_rx,
        snapshots: snapshots_tx,
        diagnostics: diagnostics_tx.clone(),
    };
    tokio::spawn(actor.run());

    MatchHandle {
        commands: commands_tx,
        events: events_tx,
        snapshots: snapshots_rx,
        diagnostics: diagnostics_tx,
    }
}

// ---------------------------------------------------------------------------
// MatchActor
// ---------------------------------------------------------------------------

/// The internal actor state. Runs inside a Tokio task.
struct MatchActor<S: ProposalSink> {
    state: MatchState,
    sink: Arc<S>,
    proposal_timeout: Option<Duration>,
    /// When the pending proposal times out.
    deadline: Option<(ProposalId, Instant)>,
    commands: mpsc::Receiver<MatchCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    /// Completed proposal writes. The actor holds both ends, so `recv`
    /// never yields `None`.
    submitted_tx: mpsc::UnboundedSender<Submitted>,
    submitted: mpsc::UnboundedReceiver<Submitted>,
    snapshots: watch::Sender<Snapshot>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl<S: ProposalSink> MatchActor<S> {
    async fn run(mut self) {
        tracing::debug!("match actor started");

        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some((_, at)) => sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };

            // Inbound events first: a verdict already queued is applied
            // before the next command is looked at.
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                Some(done) = self.submitted.recv() => self.handle_submitted(done),
                cmd = self.commands.recv() => match cmd {
                    Some(MatchCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                () = timer => self.handle_timeout(),
            }

            self.settle();
        }

        tracing::debug!("match actor stopped");
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => self.state.connection_opened(),
            SessionEvent::Message(msg) => {
                dispatch(&mut self.state, msg);
            }
            SessionEvent::Error(message) => self.state.connection_error(&message),
            SessionEvent::Reconnecting { attempt, .. } => {
                self.state.connection_reconnecting(attempt);
            }
            SessionEvent::Closed(info) => self.state.connection_closed(&info),
        }
    }

    fn handle_command(&mut self, cmd: MatchCommand) {
        match cmd {
            // Published before replying, so a caller that subscribes right
            // after sees its own change.
            MatchCommand::Propose { payload, reply } => self.propose(payload, reply),
            MatchCommand::Reset { reply } => {
                let result = self.state.reset();
                self.settle();
                let _ = reply.send(result);
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            MatchCommand::Shutdown => {}
        }
    }

    fn propose(
        &mut self,
        payload: Value,
        reply: oneshot::Sender<Result<ProposalId, MatchError>>,
    ) {
        let proposal = match self.state.prepare_proposal(payload) {
            Ok(proposal) => proposal,
            Err(e) => {
                self.settle();
                let _ = reply.send(Err(e));
                return;
            }
        };
        let id = proposal.id;
        let msg = ClientMessage::ActionProposal {
            payload: proposal.payload.clone(),
        };

        // Pending before the write: a verdict can only follow it.
        self.state.record_pending(proposal);
        if let Some(timeout) = self.proposal_timeout {
            self.deadline = Some((id, Instant::now() + timeout));
        }

        let sink = Arc::clone(&self.sink);
        let done = self.submitted_tx.clone();
        tokio::spawn(async move {
            let result = sink.submit(&msg).await;
            // Fails only once the actor has stopped; the caller then
            // sees `Unavailable`.
            let _ = done.send(Submitted { id, result, reply });
        });
    }

    fn handle_submitted(&mut self, done: Submitted) {
        let Submitted { id, result, reply } = done;
        let result = match result {
            Ok(()) => Ok(id),
            Err(e) => {
                tracing::warn!(proposal = %id, error = %e, "proposal not sent");
                self.state.abandon(id);
                Err(e.into())
            }
        };
        self.settle();
        let _ = reply.send(result);
    }

    fn handle_timeout(&mut self) {
        if let Some((id, _)) = self.deadline.take() {
            self.state.expire(id);
        }
    }

    fn settle(&mut self) {
        self.disarm_if_resolved();
        self.publish();
    }

    fn disarm_if_resolved(&mut self) {
        let pending = self.state.pending().map(|p| p.id);
        if self.deadline.is_some_and(|(id, _)| Some(id) != pending) {
            self.deadline = None;
        }
    }

    fn publish(&mut self) {
        for diagnostic in self.state.take_diagnostics() {
            // No subscribers is fine.
            let _ = self.diagnostics.send(diagnostic);
        }

        let snapshot = self.state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
