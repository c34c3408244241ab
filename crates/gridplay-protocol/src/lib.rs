//! Wire protocol for the GridPlay client.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Types** ([`Envelope`], [`ServerMessage`], [`ClientMessage`], ...):
//!   the message structures that travel on the wire.
//! - **Events** ([`MatchEvent`]): the typed interpretation of the
//!   name-keyed [`GameEvent`] payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and session
//! (connection lifecycle). It doesn't know about sockets or match state;
//! it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerMessage) → Session → Match
//! ```

mod codec;
mod error;
mod event;
mod types;

pub use codec::{Codec, JsonCodec, WireMessage};
pub use error::ProtocolError;
pub use event::MatchEvent;
pub use types::{
    ActionApproved, ActionDenied, ClientKind, ClientMessage, Envelope,
    GameEnded, GameEvent, Orientation, ServerKind, ServerMessage,
};
