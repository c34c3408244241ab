//! Error types for the session layer.

use gridplay_protocol::ProtocolError;
use gridplay_transport::TransportError;

/// Errors that can occur while using a [`Session`](crate::Session).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session is not open, so nothing was sent.
    ///
    /// Carries the user-facing status at the time of the call (for example
    /// `"Cannot connect to server."`). Messages are never buffered while
    /// disconnected.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The outbound message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport failed while sending.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// [`Session::start`](crate::Session::start) was called on a session
    /// that was already started (or already closed).
    #[error("session already started")]
    AlreadyStarted,
}
