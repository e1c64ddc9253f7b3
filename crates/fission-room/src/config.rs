//! Room configuration and the per-connection state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for one hosted or joined room.
///
/// Only the host's `max_participants` matters for admission; the other
/// fields are local to each peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum participants, host included.
    pub max_participants: usize,

    /// Bound on connecting to the host and waiting for its answer, and on
    /// each mesh dial. The host also closes links that send no `join`
    /// within it.
    pub join_timeout: Duration,

    /// Board rows for new games.
    pub board_rows: usize,

    /// Board columns for new games.
    pub board_cols: usize,

    /// How long a typing indicator lasts without a refresh.
    pub typing_timeout: Duration,

    /// Chat lines kept per room. The oldest go first.
    pub chat_history: usize,

    /// Capacity of the command channel between handles and the actor.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_participants: 4,
            join_timeout: Duration::from_secs(10),
            board_rows: fission_engine::DEFAULT_ROWS,
            board_cols: fission_engine::DEFAULT_COLS,
            typing_timeout: Duration::from_secs(3),
            chat_history: 200,
            command_buffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The lifecycle of one link in the registry.
///
/// Transitions only move forward:
///
/// ```text
/// Connecting → Open → Closed
/// ```
///
/// - **Connecting**: accepted by the host, `join` not yet admitted.
/// - **Open**: carries room traffic.
/// - **Closed**: terminal. Talking to the same peer again takes a new
///   connection and a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// The single state this one may advance to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Open),
            Self::Open => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed. Any live state
    /// may close directly.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Closed && self != Self::Closed)
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_next_follows_strict_order() {
        assert_eq!(ConnectionState::Connecting.next(), Some(ConnectionState::Open));
        assert_eq!(ConnectionState::Open.next(), Some(ConnectionState::Closed));
        assert_eq!(ConnectionState::Closed.next(), None);
    }

    #[test]
    fn test_connection_state_can_transition_to() {
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Open));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Closed));
        assert!(ConnectionState::Open.can_transition_to(ConnectionState::Closed));
        assert!(!ConnectionState::Open.can_transition_to(ConnectionState::Connecting));
        assert!(!ConnectionState::Closed.can_transition_to(ConnectionState::Open));
        assert!(!ConnectionState::Closed.can_transition_to(ConnectionState::Closed));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_participants, 4);
        assert_eq!(config.join_timeout, Duration::from_secs(10));
        assert_eq!((config.board_rows, config.board_cols), (9, 6));
        assert_eq!(config.typing_timeout, Duration::from_secs(3));
        assert_eq!(config.chat_history, 200);
    }
}
