//! Session configuration: where to connect and what to do when the
//! connection drops.

use std::time::Duration;

use rand::Rng;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:4000/ws";

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// How the session retries after losing (or failing to open) its
/// connection.
///
/// The default is [`ReconnectPolicy::disabled`]: one connection per
/// session, and any close is final. With retries enabled the delay before
/// attempt `n` is `initial_delay * 2^(n-1)`, capped at `max_delay`:
///
/// ```text
/// attempt:  1      2      3      4      5 ...
/// delay:    0.5s   1s     2s     4s     8s (capped at max_delay)
/// ```
///
/// With `jitter` on, the actual delay is drawn uniformly from
/// `0..=delay` ("full jitter"), so many clients dropped at the same time
/// don't all come back in the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries before giving up. `0` disables reconnection.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Randomize each delay within `0..=delay`.
    pub jitter: bool,
}

impl ReconnectPolicy {
    /// No reconnection: the first close is terminal.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }

    /// Exponential backoff with up to `max_attempts` retries.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::disabled()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns `true` if at least one retry is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Returns the delay to wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if !self.jitter || base.is_zero() {
            return base;
        }
        let ceiling = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=ceiling))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Session`](crate::Session).
///
/// ```rust
/// use std::time::Duration;
/// use gridplay_session::{ReconnectPolicy, SessionConfig};
///
/// let config = SessionConfig::new("ws://game.example:4000/ws")
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_reconnect(ReconnectPolicy::exponential(3));
/// assert_eq!(config.endpoint, "ws://game.example:4000/ws");
/// assert!(config.reconnect.is_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server URL, e.g. `ws://127.0.0.1:4000/ws`.
    pub endpoint: String,

    /// How long a single connection attempt may take.
    pub connect_timeout: Duration,

    /// What to do after the connection drops.
    pub reconnect: ReconnectPolicy,

    /// Close the connection when the process receives Ctrl-C.
    ///
    /// Read by the client facade, which owns the exit hook.
    pub close_on_interrupt: bool,
}

impl SessionConfig {
    /// Creates a config for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    #[must_use]
    pub fn with_close_on_interrupt(mut self, enabled: bool) -> Self {
        self.close_on_interrupt = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::disabled(),
            close_on_interrupt: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::exponential(max_attempts)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000))
            .with_jitter(false)
    }

    #[test]
    fn test_reconnect_policy_default_is_disabled() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 0);
        assert!(!policy.is_enabled());
    }

    #[test]
    fn test_delay_for_doubles_each_attempt() {
        let policy = fixed(5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_for_is_capped_at_max_delay() {
        let policy = fixed(50);
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_for_with_jitter_stays_within_bound() {
        let policy = fixed(3).with_jitter(true);
        for attempt in 1..=3 {
            let bound = fixed(3).delay_for(attempt);
            for _ in 0..50 {
                assert!(policy.delay_for(attempt) <= bound);
            }
        }
    }

    #[test]
    fn test_session_config_default_endpoint() {
        let config = SessionConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.close_on_interrupt);
        assert!(!config.reconnect.is_enabled());
    }
}
