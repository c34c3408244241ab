//! Connection state and the user-facing status strings derived from it.

use std::fmt;

use gridplay_transport::CloseInfo;

/// Status shown when the connection failed or closed without a reason.
pub const CANNOT_CONNECT: &str = "Cannot connect to server.";

/// Status shown while connecting and until the server starts a match.
pub const WAITING_FOR_MATCH: &str = "Waiting for match...";

/// Status shown while a dropped connection is being retried.
pub const RECONNECTING: &str = "Reconnecting...";

/// Lifecycle of the session's single connection.
///
/// ```text
///   Connecting ──→ Open ──→ Closed
///       │           │         ↑
///       │           ▼         │
///       └──→ Reconnecting ────┘
///               │    ↑
///               ▼    │
///               Open ┘
/// ```
///
/// `Reconnecting` only appears when a [`ReconnectPolicy`] allows retries.
/// `Closed` is terminal.
///
/// [`ReconnectPolicy`]: crate::ReconnectPolicy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The first connection attempt is in progress.
    Connecting,

    /// Connected. Messages can be sent.
    Open,

    /// The connection dropped; retry number `attempt` is scheduled or
    /// underway.
    Reconnecting { attempt: u32 },

    /// Closed for good. `status` is what the player should be shown.
    Closed { status: String },
}

impl SessionState {
    /// Returns `true` if messages can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once the session can never open again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` once the first connection attempt has resolved.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Connecting)
    }

    /// The user-facing status line for this state.
    pub fn status(&self) -> String {
        match self {
            Self::Connecting | Self::Open => WAITING_FOR_MATCH.to_string(),
            Self::Reconnecting { .. } => RECONNECTING.to_string(),
            Self::Closed { status } => status.clone(),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting({attempt})"),
            Self::Closed { .. } => write!(f, "Closed"),
        }
    }
}

/// The status to show after a close: the server's reason if it gave
/// one, otherwise [`CANNOT_CONNECT`].
pub fn close_status(info: &CloseInfo) -> String {
    if info.reason.is_empty() {
        CANNOT_CONNECT.to_string()
    } else {
        info.reason.clone()
    }
}
