//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between envelopes and raw bytes.
//! The layers above don't care HOW envelopes are serialized; they only
//! need something that implements [`Codec`].
//!
//! Message-level conversion lives in [`WireMessage`]: it turns a typed
//! message into an [`Envelope`] and back, and is where the per-kind
//! payload rules are enforced. A codec only has to handle envelopes.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    ActionApproved, ActionDenied, ClientKind, ClientMessage, Envelope, GameEnded,
    GameEvent, ProtocolError, ServerKind, ServerMessage,
};

/// A message type that can travel inside an [`Envelope`].
///
/// Implemented for both directions ([`ServerMessage`] and
/// [`ClientMessage`]) so the same codec can serve the client and the
/// fake servers used in tests.
pub trait WireMessage: Sized {
    /// Wraps this message in an envelope.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownKind`] if the message has no recognized kind
    /// - [`ProtocolError::MissingPayload`] if a required payload is `null`
    /// - [`ProtocolError::Encode`] if the payload can't be represented
    fn to_envelope(&self) -> Result<Envelope, ProtocolError>;

    /// Unwraps an envelope into a typed message.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidPayload`] if `data` doesn't match
    /// the kind's shape.
    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError>;
}

/// A codec that can encode envelopes to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` because the codec is owned by the session and
/// used from its background reader task as well as from callers of
/// `send`.
///
/// ## Generic methods
///
/// [`encode`](Codec::encode) and [`decode`](Codec::decode) work with any
/// [`WireMessage`] and are provided in terms of the two envelope methods,
/// so an implementation only writes those two.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one frame into an envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] if the bytes are not shaped
    /// like `{ "type": <integer>, "data": <any> }`.
    fn decode_envelope(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;

    /// Encodes a typed message.
    fn encode<M: WireMessage>(&self, msg: &M) -> Result<Vec<u8>, ProtocolError> {
        self.encode_envelope(&msg.to_envelope()?)
    }

    /// Decodes a typed message.
    fn decode<M: WireMessage>(&self, data: &[u8]) -> Result<M, ProtocolError> {
        M::from_envelope(self.decode_envelope(data)?)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`), one object per frame.
///
/// ## Example
///
/// ```rust
/// use gridplay_protocol::{ActionDenied, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
///
/// let msg = ServerMessage::ActionDenied(ActionDenied {
///     reason: "occupied".into(),
/// });
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(bytes, br#"{"type":3,"data":{"reason":"occupied"}}"#);
///
/// let decoded: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(ProtocolError::Encode)
    }

    fn decode_envelope(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        // Parse to a `Value` first: the derived `Deserialize` for a struct
        // would also accept a JSON array like `[1, {}]`.
        let value: Value = serde_json::from_slice(data).map_err(ProtocolError::Malformed)?;
        if !value.is_object() {
            return Err(ProtocolError::Malformed(serde::de::Error::custom(
                "envelope must be a JSON object",
            )));
        }
        serde_json::from_value(value).map_err(ProtocolError::Malformed)
    }
}

// ---------------------------------------------------------------------------
// WireMessage implementations
// ---------------------------------------------------------------------------

fn wrap<T: Serialize>(kind: i64, payload: &T) -> Result<Envelope, ProtocolError> {
    Ok(Envelope {
        kind,
        data: serde_json::to_value(payload).map_err(ProtocolError::Encode)?,
    })
}

fn unwrap<T: DeserializeOwned>(kind: &'static str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

impl WireMessage for ServerMessage {
    fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Self::GameEnded(p) => wrap(ServerKind::GameEnded.code(), p),
            Self::GameEvent(p) => wrap(ServerKind::GameEvent.code(), p),
            Self::ActionApproved(p) => wrap(ServerKind::ActionApproved.code(), p),
            Self::ActionDenied(p) => wrap(ServerKind::ActionDenied.code(), p),
            Self::Unknown { kind, .. } => Err(ProtocolError::UnknownKind(*kind)),
        }
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Some(kind) = ServerKind::from_code(envelope.kind) else {
            return Ok(Self::Unknown {
                kind: envelope.kind,
                data: envelope.data,
            });
        };

        let name = kind.name();
        let msg = match kind {
            ServerKind::GameEnded => Self::GameEnded(unwrap::<GameEnded>(name, envelope.data)?),
            ServerKind::GameEvent => Self::GameEvent(unwrap::<GameEvent>(name, envelope.data)?),
            ServerKind::ActionApproved => {
                Self::ActionApproved(unwrap::<ActionApproved>(name, envelope.data)?)
            }
            ServerKind::ActionDenied => {
                Self::ActionDenied(unwrap::<ActionDenied>(name, envelope.data)?)
            }
        };
        Ok(msg)
    }
}

impl WireMessage for ClientMessage {
    fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Self::ActionProposal { payload } => {
                if payload.is_null() {
                    return Err(ProtocolError::MissingPayload(
                        ClientKind::ActionProposal.name(),
                    ));
                }
                Ok(Envelope {
                    kind: ClientKind::ActionProposal.code(),
                    data: payload.clone(),
                })
            }
        }
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match ClientKind::from_code(envelope.kind) {
            Some(ClientKind::ActionProposal) => {
                if envelope.data.is_null() {
                    return Err(ProtocolError::MissingPayload(
                        ClientKind::ActionProposal.name(),
                    ));
                }
                Ok(Self::ActionProposal {
                    payload: envelope.data,
                })
            }
            None => Err(ProtocolError::UnknownKind(envelope.kind)),
        }
    }
}
