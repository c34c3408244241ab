//! The outbound seam between the match actor and the session.

use std::future::Future;

use gridplay_protocol::{ClientMessage, Codec};
use gridplay_session::{Session, SessionError};
use gridplay_transport::Connector;

/// Something that can put a proposal on the wire.
///
/// [`Session`] is the real implementation; tests substitute a recorder.
pub trait ProposalSink: Send + Sync + 'static {
    /// Sends one message. Must fail with
    /// [`SessionError::NotConnected`] rather than queue when there is no
    /// open connection.
    fn submit(&self, msg: &ClientMessage) -> impl Future<Output = Result<(), SessionError>> + Send;
}

impl<K: Connector, C: Codec> ProposalSink for Session<K, C> {
    async fn submit(&self, msg: &ClientMessage) -> Result<(), SessionError> {
        self.send(msg).await
    }
}
