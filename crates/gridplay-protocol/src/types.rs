//! Core protocol types for GridPlay's wire format.
//!
//! Every frame on the wire is one JSON object:
//!
//! ```text
//! { "type": <integer kind>, "data": <payload> }
//! ```
//!
//! The integer `type` is looked up in a closed set that depends on the
//! direction: [`ServerKind`] for server → client, [`ClientKind`] for
//! client → server. The payload shape is fixed per kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The seat assigned to this client by the server (e.g. `"white"`,
/// `"black"`, or a tic-tac-toe mark like `"X"`).
///
/// The client never chooses its own orientation; it is only ever created
/// from a server `match_start` event.
///
/// `#[serde(transparent)]` serializes this as the bare string, so
/// `Orientation::new("black")` becomes `"black"` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orientation(String);

impl Orientation {
    /// Creates an orientation from the server-supplied seat name.
    pub fn new(seat: impl Into<String>) -> Self {
        Self(seat.into())
    }

    /// Returns the seat name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// The closed set of server → client message kinds.
///
/// The discriminants are the integers used in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// The game is over.
    GameEnded = 0,
    /// A game-specific event, keyed by name.
    GameEvent = 1,
    /// The server's answer to a proposal (approved or not).
    ActionApproved = 2,
    /// The server refused a proposal outright.
    ActionDenied = 3,
}

impl ServerKind {
    /// Returns the wire integer for this kind.
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Looks up a kind by its wire integer.
    ///
    /// Returns `None` for values outside the closed set.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::GameEnded),
            1 => Some(Self::GameEvent),
            2 => Some(Self::ActionApproved),
            3 => Some(Self::ActionDenied),
            _ => None,
        }
    }

    /// Returns a stable name for logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GameEnded => "GameEnded",
            Self::GameEvent => "GameEvent",
            Self::ActionApproved => "ActionApproved",
            Self::ActionDenied => "ActionDenied",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The closed set of client → server message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// "I want to do X." The server decides whether X is legal.
    ActionProposal = 0,
}

impl ClientKind {
    /// Returns the wire integer for this kind.
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Looks up a kind by its wire integer.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::ActionProposal),
            _ => None,
        }
    }

    /// Returns a stable name for logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ActionProposal => "ActionProposal",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of [`ServerKind::GameEnded`].
///
/// `status` is what the player should see (`"win"`, `"lose"`, `"draw"`);
/// `cause` explains it (`"checkmate"`, or empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnded {
    pub status: String,
    #[serde(default)]
    pub cause: String,
}

/// Payload of [`ServerKind::GameEvent`].
///
/// `data` is deliberately left as raw JSON here: its meaning depends on
/// `name`. Use [`GameEvent::interpret`] to get the typed
/// [`MatchEvent`](crate::MatchEvent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of [`ServerKind::ActionApproved`].
///
/// Despite the name, `approved` may be `false`; `reason` then says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionApproved {
    pub approved: bool,
    #[serde(default)]
    pub reason: String,
}

/// Payload of [`ServerKind::ActionDenied`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDenied {
    #[serde(default)]
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A decoded server → client message.
///
/// This is not serialized directly; it converts to and from an
/// [`Envelope`] through [`WireMessage`](crate::WireMessage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    GameEnded(GameEnded),
    GameEvent(GameEvent),
    ActionApproved(ActionApproved),
    ActionDenied(ActionDenied),

    /// A `type` outside [`ServerKind`]. Kept, not rejected, so a newer
    /// server can add kinds without breaking older clients.
    Unknown { kind: i64, data: Value },
}

impl ServerMessage {
    /// Returns the recognized kind, or `None` for [`ServerMessage::Unknown`].
    pub fn kind(&self) -> Option<ServerKind> {
        match self {
            Self::GameEnded(_) => Some(ServerKind::GameEnded),
            Self::GameEvent(_) => Some(ServerKind::GameEvent),
            Self::ActionApproved(_) => Some(ServerKind::ActionApproved),
            Self::ActionDenied(_) => Some(ServerKind::ActionDenied),
            Self::Unknown { .. } => None,
        }
    }
}

/// A client → server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Propose a game action. `payload` is opaque to the client and must
    /// not be `null`.
    ActionProposal { payload: Value },
}

impl ClientMessage {
    /// Returns the kind of this message.
    pub fn kind(&self) -> ClientKind {
        match self {
            Self::ActionProposal { .. } => ClientKind::ActionProposal,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an Envelope.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ type: 1                      │  ← message kind (integer)
/// │ ┌──────────────────────────┐ │
/// │ │ data: { name, data }     │ │  ← kind-specific payload
/// │ └──────────────────────────┘ │
/// └──────────────────────────────┘
/// ```
///
/// `kind` is an `i64` rather than one of the kind enums so that unknown
/// values survive decoding and can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: i64,
    pub data: Value,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! JSON shape tests. The server is not written in Rust, so these pin
    //! the exact field names and integer codes it expects.

    use super::*;

    #[test]
    fn test_orientation_serializes_as_plain_string() {
        let json = serde_json::to_string(&Orientation::new("black")).unwrap();
        assert_eq!(json, "\"black\"");
    }

    #[test]
    fn test_orientation_display() {
        assert_eq!(Orientation::new("white").to_string(), "white");
    }

    #[test]
    fn test_server_kind_codes_match_wire_table() {
        assert_eq!(ServerKind::GameEnded.code(), 0);
        assert_eq!(ServerKind::GameEvent.code(), 1);
        assert_eq!(ServerKind::ActionApproved.code(), 2);
        assert_eq!(ServerKind::ActionDenied.code(), 3);
    }

    #[test]
    fn test_server_kind_from_code_rejects_out_of_range() {
        assert_eq!(ServerKind::from_code(2), Some(ServerKind::ActionApproved));
        assert_eq!(ServerKind::from_code(4), None);
        assert_eq!(ServerKind::from_code(-1), None);
    }

    #[test]
    fn test_client_kind_action_proposal_is_zero() {
        assert_eq!(ClientKind::ActionProposal.code(), 0);
        assert_eq!(ClientKind::from_code(0), Some(ClientKind::ActionProposal));
        assert_eq!(ClientKind::from_code(1), None);
    }

    #[test]
    fn test_envelope_json_uses_type_and_data() {
        let envelope = Envelope {
            kind: 3,
            data: serde_json::json!({ "reason": "occupied" }),
        };
        let json: Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], 3);
        assert_eq!(json["data"]["reason"], "occupied");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_action_approved_reads_approved_field() {
        let msg: ActionApproved =
            serde_json::from_str(r#"{"approved": false, "reason": "not your turn"}"#)
                .unwrap();
        assert!(!msg.approved);
        assert_eq!(msg.reason, "not your turn");
    }

    #[test]
    fn test_game_ended_cause_defaults_to_empty() {
        let msg: GameEnded = serde_json::from_str(r#"{"status": "draw"}"#).unwrap();
        assert_eq!(msg.status, "draw");
        assert_eq!(msg.cause, "");
    }

    #[test]
    fn test_game_ended_requires_status() {
        let result: Result<GameEnded, _> = serde_json::from_str(r#"{"cause": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_kind_of_unknown_is_none() {
        let msg = ServerMessage::Unknown {
            kind: 42,
            data: Value::Null,
        };
        assert_eq!(msg.kind(), None);
    }
}
