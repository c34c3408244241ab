//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization/deserialization or in
//! the shape of a message, not in networking or match state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes are not an envelope: not JSON, not an object, or missing
    /// the integer `type` / the `data` field.
    ///
    /// The session drops frames that fail this way and keeps the
    /// connection open.
    #[error("malformed envelope: {0}")]
    Malformed(serde_json::Error),

    /// The envelope names a known kind, but its `data` does not have the
    /// shape that kind requires (e.g. `GameEnded` without `status`).
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        /// Name of the message kind whose payload was rejected.
        kind: &'static str,
        /// The underlying serde error.
        source: serde_json::Error,
    },

    /// A message kind that requires a payload was given `null`.
    #[error("{0} requires a non-null payload")]
    MissingPayload(&'static str),

    /// The message kind is not part of the closed set for this direction.
    ///
    /// Inbound server messages never produce this error on decode; they
    /// become [`ServerMessage::Unknown`](crate::ServerMessage::Unknown)
    /// instead. It is returned when encoding an `Unknown` message or when
    /// decoding an unrecognized client message.
    #[error("unknown message kind {0}")]
    UnknownKind(i64),

    /// The message is well-formed JSON but violates a protocol rule, such
    /// as a `match_start` event that names no seat.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
