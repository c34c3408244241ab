//! Typed interpretation of name-keyed game events.
//!
//! The server wraps every game-specific notification in a
//! [`GameEvent`] `{ name, data }`. Over time the server has sent `data`
//! both as a JSON object and as a string holding JSON, and has used two
//! names for the same events (`game_start`/`match_start`,
//! `fen_update`/`state_update`). [`GameEvent::interpret`] folds all of
//! those into one [`MatchEvent`] so nothing above this crate has to care.

use serde::Deserialize;
use serde_json::Value;

use crate::{GameEvent, Orientation, ProtocolError};

const MATCH_START: &str = "match_start";
const MATCH_START_LEGACY: &str = "game_start";
const STATE_UPDATE: &str = "state_update";
const STATE_UPDATE_LEGACY: &str = "fen_update";

/// A game event with its payload decoded according to its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// The server paired us with an opponent and assigned our seat.
    MatchStart {
        orientation: Orientation,
        /// The opponent's seat, when the server sends it.
        opponent: Option<Orientation>,
    },

    /// Authoritative board/state string (e.g. a FEN for chess).
    StateUpdate { position: String },

    /// An event name this client doesn't interpret. Passed along so the
    /// caller can log it.
    Other { name: String, data: Value },
}

/// `match_start` payload. Chess sends `color`; tic-tac-toe sends the
/// marks as Unicode code points.
#[derive(Deserialize)]
struct MatchStartData {
    color: Option<String>,
    #[serde(rename = "char")]
    mark: Option<u32>,
    #[serde(rename = "opponentChar")]
    opponent_mark: Option<u32>,
}

#[derive(Deserialize)]
struct StateUpdateData {
    #[serde(alias = "fen")]
    position: String,
}

impl GameEvent {
    /// Builds a `match_start` event. Mostly useful for tests and fakes.
    pub fn match_start(color: &str) -> Self {
        Self {
            name: MATCH_START.to_string(),
            data: serde_json::json!({ "color": color }),
        }
    }

    /// Builds a `state_update` event.
    pub fn state_update(position: &str) -> Self {
        Self {
            name: STATE_UPDATE.to_string(),
            data: serde_json::json!({ "position": position }),
        }
    }

    /// Decodes `data` according to `name`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if a known event is
    /// missing the fields it needs. Unknown names are not an error; they
    /// become [`MatchEvent::Other`].
    pub fn interpret(&self) -> Result<MatchEvent, ProtocolError> {
        match self.name.as_str() {
            MATCH_START | MATCH_START_LEGACY => self.interpret_match_start(),
            STATE_UPDATE | STATE_UPDATE_LEGACY => self.interpret_state_update(),
            _ => Ok(MatchEvent::Other {
                name: self.name.clone(),
                data: self.data.clone(),
            }),
        }
    }

    fn interpret_match_start(&self) -> Result<MatchEvent, ProtocolError> {
        let data: MatchStartData = serde_json::from_value(unwrap_string(&self.data))
            .map_err(|e| self.invalid(&e.to_string()))?;

        let orientation = match (data.color, data.mark) {
            (Some(color), _) => Orientation::new(color),
            (None, Some(mark)) => mark_to_orientation(mark)
                .ok_or_else(|| self.invalid("char is not a valid code point"))?,
            (None, None) => return Err(self.invalid("missing color")),
        };
        let opponent = data.opponent_mark.and_then(mark_to_orientation);

        Ok(MatchEvent::MatchStart {
            orientation,
            opponent,
        })
    }

    fn interpret_state_update(&self) -> Result<MatchEvent, ProtocolError> {
        // A bare string that isn't JSON is the position itself.
        if let Value::String(raw) = &self.data {
            if !matches!(serde_json::from_str::<Value>(raw), Ok(Value::Object(_))) {
                return Ok(MatchEvent::StateUpdate {
                    position: raw.clone(),
                });
            }
        }

        let data: StateUpdateData = serde_json::from_value(unwrap_string(&self.data))
            .map_err(|e| self.invalid(&e.to_string()))?;
        Ok(MatchEvent::StateUpdate {
            position: data.position,
        })
    }

    fn invalid(&self, detail: &str) -> ProtocolError {
        ProtocolError::InvalidMessage(format!("{} event: {detail}", self.name))
    }
}

/// If `data` is a string containing JSON, returns the parsed JSON;
/// otherwise returns `data` unchanged.
fn unwrap_string(data: &Value) -> Value {
    match data {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| data.clone()),
        other => other.clone(),
    }
}

fn mark_to_orientation(mark: u32) -> Option<Orientation> {
    char::from_u32(mark).map(|c| Orientation::new(c.to_string()))
}
