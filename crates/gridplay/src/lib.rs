//! # GridPlay
//!
//! Network client for realtime two-player games where the server has the
//! final word on every move.
//!
//! The client keeps one WebSocket connection to the game server, turns
//! inbound frames into typed events, and runs an optimistic
//! "propose → await verdict → commit or roll back" protocol so a UI can
//! react immediately while staying correctable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridplay::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), GridPlayError> {
//! let client = GridPlayClient::builder()
//!     .endpoint("ws://127.0.0.1:4000/ws")
//!     .connect()
//!     .await?;
//!
//! let mut snapshots = client.subscribe();
//! snapshots
//!     .wait_for(|s| s.phase == MatchPhase::Active)
//!     .await
//!     .ok();
//!
//! client.propose_action(json!({ "from": "e2", "to": "e4" })).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - [`protocol`]: wire envelope and message kinds
//! - [`transport`]: connection traits and the WebSocket implementation
//! - [`session`]: connection lifecycle, status, reconnection
//! - [`game`]: match state machine and the approval protocol

mod client;
mod error;

pub use client::{GridPlayClient, GridPlayClientBuilder, WebSocketSession};
pub use error::GridPlayError;

pub use gridplay_match as game;
pub use gridplay_protocol as protocol;
pub use gridplay_session as session;
pub use gridplay_transport as transport;

/// Everything a game UI usually needs.
pub mod prelude {
    pub use crate::{GridPlayClient, GridPlayClientBuilder, GridPlayError};
    pub use gridplay_match::{
        Diagnostic, MatchConfig, MatchError, MatchPhase, Proposal, ProposalId, ProposalOutcome,
        Resolution, Snapshot,
    };
    pub use gridplay_protocol::{GameEnded, Orientation};
    pub use gridplay_session::{ReconnectPolicy, SessionConfig, SessionError, SessionState};
}
