//! The match state machine.
//!
//! [`MatchState`] is plain data plus transition methods: no channels, no
//! tasks, no I/O. The actor owns one and feeds it events one at a time,
//! which is what makes every transition atomic with respect to the
//! others.
//!
//! Transitions that don't fit the current state never fail. They leave
//! the state untouched and record a [`Diagnostic`] instead.

use std::fmt;

use gridplay_protocol::{GameEnded, MatchEvent, Orientation};
use gridplay_session::{
    CANNOT_CONNECT, RECONNECTING, SessionError, SessionState, WAITING_FOR_MATCH, close_status,
};
use gridplay_transport::CloseInfo;
use serde_json::Value;

use crate::{MatchError, MatchPhase};

/// Status shown once the server starts a match.
pub const MATCH_STARTED: &str = "Match started!";

/// Denial reason used when a proposal gets no verdict in time.
pub const TIMEOUT_REASON: &str = "timeout";

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// Locally assigned proposal number. Increases monotonically for the
/// lifetime of the state; never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProposalId(u64);

impl ProposalId {
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal-{}", self.0)
    }
}

/// An action sent to the server and awaiting its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: ProposalId,
    pub payload: Value,
}

/// How a proposal was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// The server approved it. The position changes with the next
    /// `state_update`, not before.
    Committed,
    /// The server denied it (or it timed out). The UI should roll back
    /// any optimistic change.
    Rejected { reason: String },
    /// The connection was replaced before a verdict arrived.
    Lost,
}

/// The outcome of the most recently resolved proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: ProposalId,
    pub outcome: ProposalOutcome,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A non-fatal signal that an inbound message didn't match local state,
/// or that something was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A verdict arrived with no proposal pending.
    UnexpectedApproval { approved: bool, reason: String },
    /// A known event arrived in a phase where it means nothing.
    UnexpectedEvent { phase: MatchPhase, event: String },
    /// An envelope with an unrecognized `type`.
    UnknownKind { kind: i64 },
    /// A game event with an unrecognized name.
    UnknownEvent { name: String },
    /// A known game event whose payload couldn't be interpreted.
    InvalidEvent { name: String, error: String },
    /// A pending proposal will never get a verdict.
    ProposalLost { id: ProposalId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedApproval { approved, reason } => {
                write!(f, "verdict (approved={approved}, reason={reason:?}) with nothing pending")
            }
            Self::UnexpectedEvent { phase, event } => {
                write!(f, "unexpected {event} in phase {phase}")
            }
            Self::UnknownKind { kind } => write!(f, "unknown message type {kind}"),
            Self::UnknownEvent { name } => write!(f, "unknown game event {name:?}"),
            Self::InvalidEvent { name, error } => write!(f, "invalid {name} event: {error}"),
            Self::ProposalLost { id } => write!(f, "{id} lost with the connection"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only projection of the match for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: MatchPhase,
    /// Our seat, once the match has started.
    pub orientation: Option<Orientation>,
    /// The opponent's seat, when the server names it (tic-tac-toe marks).
    pub opponent: Option<Orientation>,
    /// The last authoritative position from the server.
    pub position: Option<String>,
    /// The proposal awaiting a verdict, if any.
    pub pending: Option<Proposal>,
    /// The status line to show the player.
    pub last_status: String,
    /// How the most recent proposal was resolved.
    pub last_outcome: Option<Resolution>,
    /// The `GameEnded` payload, once the game is over.
    pub result: Option<GameEnded>,
    /// The session's connection state.
    pub connection: SessionState,
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Client-side match state and its transitions.
#[derive(Debug)]
pub struct MatchState {
    phase: MatchPhase,
    orientation: Option<Orientation>,
    opponent: Option<Orientation>,
    position: Option<String>,
    pending: Option<Proposal>,
    last_status: String,
    last_outcome: Option<Resolution>,
    result: Option<GameEnded>,
    connection: SessionState,
    initial_position: String,
    next_proposal: u64,
    has_opened: bool,
    diagnostics: Vec<Diagnostic>,
}

impl MatchState {
    /// Creates a state awaiting a match. `initial_position` is what the
    /// position becomes on `match_start`.
    pub fn new(initial_position: impl Into<String>) -> Self {
        Self {
            phase: MatchPhase::AwaitingMatch,
            orientation: None,
            opponent: None,
            position: None,
            pending: None,
            last_status: WAITING_FOR_MATCH.to_string(),
            last_outcome: None,
            result: None,
            connection: SessionState::Connecting,
            initial_position: initial_position.into(),
            next_proposal: 1,
            has_opened: false,
            diagnostics: Vec::new(),
        }
    }

    /// Seeds the connection state, for a state created after the session
    /// has already connected.
    #[must_use]
    pub fn with_connection(mut self, connection: SessionState) -> Self {
        self.has_opened = matches!(
            connection,
            SessionState::Open | SessionState::Reconnecting { .. }
        );
        self.connection = connection;
        self
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn pending(&self) -> Option<&Proposal> {
        self.pending.as_ref()
    }

    /// Builds the read-only projection. Never changes the state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            orientation: self.orientation.clone(),
            opponent: self.opponent.clone(),
            position: self.position.clone(),
            pending: self.pending.clone(),
            last_status: self.last_status.clone(),
            last_outcome: self.last_outcome.clone(),
            result: self.result.clone(),
            connection: self.connection.clone(),
        }
    }

    /// Drains the diagnostics recorded since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // -----------------------------------------------------------------------
    // Server-driven transitions
    // -----------------------------------------------------------------------

    /// Applies an interpreted game event. Returns `false` if it was not
    /// applicable (a diagnostic was recorded instead).
    pub fn apply_event(&mut self, event: MatchEvent) -> bool {
        match event {
            MatchEvent::MatchStart {
                orientation,
                opponent,
            } => {
                if self.phase != MatchPhase::AwaitingMatch {
                    self.unexpected("match_start");
                    return false;
                }
                tracing::info!(%orientation, ?opponent, "match started");
                self.phase = MatchPhase::Active;
                self.orientation = Some(orientation);
                self.opponent = opponent;
                self.position = Some(self.initial_position.clone());
                self.pending = None;
                self.result = None;
                self.last_status = MATCH_STARTED.to_string();
                true
            }
            MatchEvent::StateUpdate { position } => {
                if self.phase != MatchPhase::Active {
                    self.unexpected("state_update");
                    return false;
                }
                tracing::debug!(%position, "position updated");
                self.position = Some(position);
                true
            }
            MatchEvent::Other { name, .. } => {
                self.diagnose(Diagnostic::UnknownEvent { name });
                false
            }
        }
    }

    /// Resolves the pending proposal with the server's verdict.
    ///
    /// `ActionApproved { approved: false }` and `ActionDenied` both come
    /// here with `approved == false`. Position and orientation are never
    /// touched: the server follows up with a `state_update` if anything
    /// changed.
    pub fn resolve(&mut self, approved: bool, reason: String) -> bool {
        let Some(proposal) = self.pending.take() else {
            self.diagnose(Diagnostic::UnexpectedApproval { approved, reason });
            return false;
        };

        let outcome = if approved {
            tracing::debug!(proposal = %proposal.id, "proposal approved");
            ProposalOutcome::Committed
        } else {
            tracing::info!(proposal = %proposal.id, %reason, "proposal denied");
            if !reason.is_empty() {
                self.last_status = reason.clone();
            }
            ProposalOutcome::Rejected { reason }
        };
        self.last_outcome = Some(Resolution {
            id: proposal.id,
            outcome,
        });
        true
    }

    /// The server ended the game.
    pub fn end(&mut self, ended: GameEnded) -> bool {
        if !self.phase.can_transition_to(MatchPhase::Ended) {
            self.unexpected("game_ended");
            return false;
        }
        tracing::info!(status = %ended.status, cause = %ended.cause, "game ended");
        self.phase = MatchPhase::Ended;
        self.pending = None;
        self.last_status = if ended.cause.is_empty() {
            ended.status.clone()
        } else {
            format!("{} ({})", ended.status, ended.cause)
        };
        self.result = Some(ended);
        true
    }

    /// Records a message kind this client doesn't understand.
    pub fn unknown_kind(&mut self, kind: i64) {
        self.diagnose(Diagnostic::UnknownKind { kind });
    }

    /// Records a known game event that couldn't be interpreted.
    pub fn invalid_event(&mut self, name: String, error: String) {
        self.diagnose(Diagnostic::InvalidEvent { name, error });
    }

    // -----------------------------------------------------------------------
    // Client-driven transitions
    // -----------------------------------------------------------------------

    /// Checks whether a proposal may be sent now and, if so, allocates
    /// its id. Nothing is recorded until [`record_pending`](Self::record_pending).
    ///
    /// # Errors
    /// - [`MatchError::Session`] with `NotConnected` once the session is
    ///   closed for good
    /// - [`MatchError::ProposalAlreadyPending`] if one is outstanding
    /// - [`MatchError::NotActive`] outside an active match
    pub fn prepare_proposal(&mut self, payload: Value) -> Result<Proposal, MatchError> {
        if let SessionState::Closed { status } = &self.connection {
            return Err(SessionError::NotConnected(status.clone()).into());
        }
        if self.pending.is_some() {
            return Err(MatchError::ProposalAlreadyPending);
        }
        if !self.phase.is_active() {
            return Err(MatchError::NotActive(self.phase));
        }

        let id = ProposalId(self.next_proposal);
        self.next_proposal += 1;
        Ok(Proposal { id, payload })
    }

    /// Marks a validated proposal as pending. The actor calls this before
    /// the write goes out.
    pub fn record_pending(&mut self, proposal: Proposal) {
        debug_assert!(self.pending.is_none(), "one proposal at a time");
        tracing::debug!(proposal = %proposal.id, "proposal pending");
        self.pending = Some(proposal);
    }

    /// Drops the pending proposal `id` because its write failed. No
    /// outcome is recorded: the server never saw it.
    pub fn abandon(&mut self, id: ProposalId) -> bool {
        if self.pending.as_ref().map(|p| p.id) != Some(id) {
            return false;
        }
        tracing::debug!(proposal = %id, "proposal abandoned");
        self.pending = None;
        true
    }

    /// Resolves the pending proposal as denied with reason `"timeout"`,
    /// if it is still the one identified by `id`.
    pub fn expire(&mut self, id: ProposalId) -> bool {
        if self.pending.as_ref().map(|p| p.id) != Some(id) {
            return false;
        }
        tracing::warn!(proposal = %id, "proposal timed out");
        self.resolve(false, TIMEOUT_REASON.to_string())
    }

    /// Leaves `Ended` for a rematch on the same connection.
    ///
    /// # Errors
    /// Returns [`MatchError::InvalidTransition`] unless the phase is
    /// `Ended`.
    pub fn reset(&mut self) -> Result<(), MatchError> {
        if self.phase != MatchPhase::Ended {
            return Err(MatchError::InvalidTransition {
                from: self.phase,
                to: MatchPhase::AwaitingMatch,
            });
        }
        tracing::info!("match reset");
        self.restart();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Connection-driven transitions
    // -----------------------------------------------------------------------

    /// A connection opened. After a reconnect the server sees a new
    /// player, so the match starts over.
    pub fn connection_opened(&mut self) {
        self.connection = SessionState::Open;
        if self.has_opened {
            tracing::info!(phase = %self.phase, "reconnected, match restarts");
            self.restart();
        }
        self.has_opened = true;
    }

    /// The connection or a connection attempt failed.
    pub fn connection_error(&mut self, message: &str) {
        tracing::debug!(error = %message, "connection error");
        self.last_status = CANNOT_CONNECT.to_string();
    }

    /// The session is retrying. A pending proposal never survives this.
    pub fn connection_reconnecting(&mut self, attempt: u32) {
        self.connection = SessionState::Reconnecting { attempt };
        self.last_status = RECONNECTING.to_string();
        if let Some(proposal) = self.pending.take() {
            self.diagnose(Diagnostic::ProposalLost { id: proposal.id });
            self.last_outcome = Some(Resolution {
                id: proposal.id,
                outcome: ProposalOutcome::Lost,
            });
        }
    }

    /// The session closed for good. A pending proposal is left in place,
    /// unresolved, and reported lost.
    pub fn connection_closed(&mut self, info: &CloseInfo) {
        let status = close_status(info);
        self.connection = SessionState::Closed {
            status: status.clone(),
        };
        self.last_status = status;
        if let Some(proposal) = &self.pending {
            let id = proposal.id;
            self.diagnose(Diagnostic::ProposalLost { id });
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn restart(&mut self) {
        self.phase = MatchPhase::AwaitingMatch;
        self.orientation = None;
        self.opponent = None;
        self.position = None;
        self.pending = None;
        self.result = None;
        self.last_status = WAITING_FOR_MATCH.to_string();
    }

    fn unexpected(&mut self, event: &str) {
        self.diagnose(Diagnostic::UnexpectedEvent {
            phase: self.phase,
            event: event.to_string(),
        });
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(%diagnostic, "match diagnostic");
        self.diagnostics.push(diagnostic);
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(crate::INITIAL_POSITION)
    }
}
