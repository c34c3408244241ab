//! Transport abstraction layer for the GridPlay client.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! the duplex connection to the game server, so the session layer can be
//! driven by a real WebSocket or by an in-process fake in tests.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Close code used when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a normal, locally or remotely initiated close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection closed: the close code and the peer's reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    /// Human-readable reason from the close frame. Empty if none was sent.
    pub reason: String,
}

impl CloseInfo {
    /// Creates close info from a code and reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// The connection ended without a close handshake.
    pub fn abnormal() -> Self {
        Self::new(CLOSE_ABNORMAL, "")
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}

/// What [`Connection::recv`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// One data frame (text or binary), as bytes.
    Frame(Vec<u8>),
    /// The connection is closed. No further frames will arrive.
    Closed(CloseInfo),
}

/// Opens outgoing connections to a server endpoint.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a new connection to `endpoint`.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive frames.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// a pending `recv` must not hold up a `send`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(Incoming::Closed(_))` once the connection has closed,
    /// whether cleanly or not.
    fn recv(&self) -> impl Future<Output = Result<Incoming, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
