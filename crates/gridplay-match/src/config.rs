//! Match configuration and phase state machine.

use std::fmt;
use std::time::Duration;

/// Position used when a match starts, before the first `state_update`.
pub const INITIAL_POSITION: &str = "start";

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Configuration for a match actor.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Position set on `match_start`. Chess uses `"start"`.
    pub initial_position: String,

    /// How long a proposal may wait for a verdict before it is treated
    /// as denied with reason `"timeout"`. `None` waits forever.
    pub proposal_timeout: Option<Duration>,

    /// Capacity of the actor's command channel.
    pub command_buffer: usize,
}

impl MatchConfig {
    #[must_use]
    pub fn with_initial_position(mut self, position: impl Into<String>) -> Self {
        self.initial_position = position.into();
        self
    }

    #[must_use]
    pub fn with_proposal_timeout(mut self, timeout: Duration) -> Self {
        self.proposal_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            initial_position: INITIAL_POSITION.to_string(),
            proposal_timeout: None,
            command_buffer: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Where the client is in the life of a match.
///
/// ```text
///   AwaitingMatch ──(match_start)──→ Active ──(game_ended)──→ Ended
///        ↑ ↑                           │                       │
///        │ └───────(reconnect)─────────┘                       │
///        └──────────────────(reset / reconnect)────────────────┘
/// ```
///
/// `GameEnded` is also accepted straight from `AwaitingMatch` (the server
/// may abort a pairing before it starts).
///
/// - **AwaitingMatch**: connected (or connecting), no opponent yet.
/// - **Active**: a match is in progress; proposals are accepted.
/// - **Ended**: the server sent `GameEnded`. Terminal until an explicit
///   reset (rematch) or a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchPhase {
    AwaitingMatch,
    Active,
    Ended,
}

impl MatchPhase {
    /// Returns `true` while proposals are accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` once the game is over.
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::AwaitingMatch, Self::Active)
                | (Self::AwaitingMatch, Self::Ended)
                | (Self::Active, Self::AwaitingMatch)
                | (Self::Active, Self::Ended)
                | (Self::Ended, Self::AwaitingMatch)
        )
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingMatch => write!(f, "AwaitingMatch"),
            Self::Active => write!(f, "Active"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_phase_can_transition_to() {
        use MatchPhase::*;

        assert!(AwaitingMatch.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(Active.can_transition_to(AwaitingMatch));
        assert!(Ended.can_transition_to(AwaitingMatch));
        assert!(AwaitingMatch.can_transition_to(Ended));

        assert!(!Ended.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
        assert!(!AwaitingMatch.can_transition_to(AwaitingMatch));
    }

    #[test]
    fn test_match_phase_predicates() {
        assert!(MatchPhase::Active.is_active());
        assert!(!MatchPhase::AwaitingMatch.is_active());
        assert!(MatchPhase::Ended.is_ended());
    }

    #[test]
    fn test_match_phase_display() {
        assert_eq!(MatchPhase::AwaitingMatch.to_string(), "AwaitingMatch");
        assert_eq!(MatchPhase::Ended.to_string(), "Ended");
    }

    #[test]
    fn test_match_config_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.initial_position, "start");
        assert_eq!(config.proposal_timeout, None);
        assert_eq!(config.with_command_buffer(0).command_buffer, 1);
    }
}
