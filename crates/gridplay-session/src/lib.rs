//! Connection lifecycle for the GridPlay client.
//!
//! This crate owns the one connection a client keeps to its game server:
//!
//! 1. **Connecting**: dialing the endpoint through a
//!    [`Connector`](gridplay_transport::Connector), with a timeout
//! 2. **Decoding**: turning every inbound frame into a
//!    [`ServerMessage`](gridplay_protocol::ServerMessage) and handing it to
//!    the single registered handler ([`Session::on_event`])
//! 3. **Status**: the user-facing line ("Waiting for match...",
//!    "Cannot connect to server.", or the server's close reason)
//! 4. **Reconnection**: optional bounded retries with exponential
//!    backoff ([`ReconnectPolicy`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Match Layer (above)    ← turns session events into match state
//!     ↕
//! Session Layer (this crate)  ← one connection, its status and lifecycle
//!     ↕
//! Transport + Protocol (below)  ← frames on the wire, envelope codec
//! ```

mod config;
mod error;
mod session;
mod state;

pub use config::{DEFAULT_ENDPOINT, ReconnectPolicy, SessionConfig};
pub use error::SessionError;
pub use session::{Session, SessionEvent};
pub use state::{CANNOT_CONNECT, RECONNECTING, SessionState, WAITING_FOR_MATCH, close_status};
