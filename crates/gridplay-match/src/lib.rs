//! Match state and the move-approval protocol for the GridPlay client.
//!
//! The server is the only judge of what is legal. The client proposes an
//! action, the server approves or denies it, and only the server's
//! `state_update` changes the position. This crate tracks that exchange:
//!
//! - [`MatchState`]: the state machine itself (pure, no I/O)
//! - [`dispatch`]: routes each [`ServerMessage`](gridplay_protocol::ServerMessage)
//!   to the right transition
//! - [`MatchHandle`]: talks to the actor task that owns the state
//! - [`Snapshot`]: what the presentation layer reads
//! - [`Diagnostic`]: non-fatal "that message made no sense" signals
//!
//! # Key rule
//!
//! At most one proposal is outstanding. A second
//! [`propose_action`](MatchHandle::propose_action) before the verdict
//! fails with [`MatchError::ProposalAlreadyPending`] and sends nothing.

mod actor;
mod config;
mod dispatcher;
mod error;
mod sink;
mod state;

pub use actor::{MatchHandle, attach, spawn_match};
pub use config::{INITIAL_POSITION, MatchConfig, MatchPhase};
pub use dispatcher::{Dispatched, dispatch};
pub use error::MatchError;
pub use sink::ProposalSink;
pub use state::{
    Diagnostic, MATCH_STARTED, MatchState, Proposal, ProposalId, ProposalOutcome, Resolution,
    Snapshot, TIMEOUT_REASON,
};
