//! Routes decoded server messages to state transitions.

use gridplay_protocol::ServerMessage;

use crate::MatchState;

/// What [`dispatch`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The message changed the state.
    Applied,
    /// The message didn't fit the state; a diagnostic was recorded.
    Ignored,
}

/// Feeds one server message into `state`.
///
/// Pure routing by message kind. Nothing here fails: messages that are
/// well formed but make no sense right now come back as
/// [`Dispatched::Ignored`] with a diagnostic on the state.
pub fn dispatch(state: &mut MatchState, msg: ServerMessage) -> Dispatched {
    let applied = match msg {
        ServerMessage::GameEnded(ended) => state.end(ended),
        ServerMessage::GameEvent(event) => match event.interpret() {
            Ok(interpreted) => state.apply_event(interpreted),
            Err(e) => {
                state.invalid_event(event.name, e.to_string());
                false
            }
        },
        ServerMessage::ActionApproved(verdict) => state.resolve(verdict.approved, verdict.reason),
        ServerMessage::ActionDenied(denied) => state.resolve(false, denied.reason),
        ServerMessage::Unknown { kind, .. } => {
            tracing::debug!(kind, "dropping message of unknown type");
            state.unknown_kind(kind);
            false
        }
    };

    if applied {
        Dispatched::Applied
    } else {
        Dispatched::Ignored
    }
}
