//! Session types: what a node remembers about the room it last played in.

use std::time::Duration;

use fission_protocol::{PeerId, PlayerColor, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long after `last_connected_at` a stored session stays usable.
    ///
    /// Default: 2 hours.
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// PersistedSession
// ---------------------------------------------------------------------------

/// The last room this node joined, and who it was there.
///
/// `peer_id` is the identity the node held at the time. A rejoin asks
/// for it again but may not get it. The profile fields are what the
/// node re-announces so the other players see the same name and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    pub display_name: String,
    pub color: PlayerColor,
    pub is_host: bool,
    /// Epoch milliseconds of the last successful connect.
    pub last_connected_at: u64,
}

impl PersistedSession {
    /// Returns `true` once `ttl` has passed since `last_connected_at`.
    pub fn is_expired(&self, now_millis: u64, ttl: Duration) -> bool {
        now_millis.saturating_sub(self.last_connected_at) > ttl.as_millis() as u64
    }

    /// Stamps the session as connected at `now_millis`.
    pub fn touch(&mut self, now_millis: u64) {
        self.last_connected_at = now_millis;
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff for join and rejoin attempts.
///
/// ```text
/// attempt 1 ──fail──▶ wait base ──▶ attempt 2 ──fail──▶ wait 2·base
///           ──▶ attempt 3 ──fail──▶ wait 4·base ──▶ attempt 4 ──fail──▶ give up
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,

    /// Delay after the first failure; doubles after each further one.
    /// Default: 1 second.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// The delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Returns `true` if another attempt may follow attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Attempts in total, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
