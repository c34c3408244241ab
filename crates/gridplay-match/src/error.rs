//! Error types for the match layer.

use gridplay_session::SessionError;

use crate::MatchPhase;

/// Errors returned to callers of [`MatchHandle`](crate::MatchHandle).
///
/// None of these are fatal to the match: the state is left exactly as it
/// was before the call.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A proposal is already awaiting the server's verdict. Only one may
    /// be outstanding at a time.
    #[error("a proposal is already pending")]
    ProposalAlreadyPending,

    /// Proposals are only accepted while the match is `Active`.
    #[error("no active match (phase: {0})")]
    NotActive(MatchPhase),

    /// The requested phase change isn't allowed from the current phase.
    #[error("cannot go from {from} to {to}")]
    InvalidTransition { from: MatchPhase, to: MatchPhase },

    /// The session refused or failed to send the proposal.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The match actor has stopped.
    #[error("match actor is unavailable")]
    Unavailable,
}
