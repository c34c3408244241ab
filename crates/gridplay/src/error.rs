//! Unified error type for the GridPlay client.

use gridplay_match::MatchError;
use gridplay_protocol::ProtocolError;
use gridplay_session::SessionError;
use gridplay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `gridplay` crate you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute
/// on each variant generates the `From` impl, so `?` converts layer
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GridPlayError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not connected, already started).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A match-level error (proposal pending, not active, bad reset).
    #[error(transparent)]
    Match(#[from] MatchError),
}

impl GridPlayError {
    /// Returns the user-facing status if this error means "not connected".
    pub fn not_connected_status(&self) -> Option<&str> {
        match self {
            Self::Session(SessionError::NotConnected(status))
            | Self::Match(MatchError::Session(SessionError::NotConnected(status))) => {
                Some(status.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use gridplay_match::MatchPhase;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let gridplay_err: GridPlayError = err.into();
        assert!(matches!(gridplay_err, GridPlayError::Transport(_)));
        assert!(gridplay_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let gridplay_err: GridPlayError = err.into();
        assert!(matches!(gridplay_err, GridPlayError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotConnected("Cannot connect to server.".into());
        let gridplay_err: GridPlayError = err.into();
        assert!(matches!(gridplay_err, GridPlayError::Session(_)));
        assert_eq!(
            gridplay_err.not_connected_status(),
            Some("Cannot connect to server.")
        );
    }

    #[test]
    fn test_from_match_error() {
        let err = MatchError::NotActive(MatchPhase::Ended);
        let gridplay_err: GridPlayError = err.into();
        assert!(matches!(gridplay_err, GridPlayError::Match(_)));
        assert_eq!(gridplay_err.not_connected_status(), None);
    }

    #[test]
    fn test_not_connected_status_through_match_error() {
        let err: GridPlayError =
            MatchError::from(SessionError::NotConnected("opponent disconnected".into())).into();
        assert_eq!(err.not_connected_status(), Some("opponent disconnected"));
    }
}
