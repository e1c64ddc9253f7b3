//! Error types for the room layer.

use fission_engine::MoveError;
use fission_protocol::{PeerId, PlayerColor, ProtocolError, RejectReason, RoomId};
use fission_transport::TransportError;

/// Errors that can occur while hosting, joining, or acting in a room.
///
/// Establishment failures (`AddressInUse`, `ConnectFailed`, `Rejected`)
/// go to whoever called [`host`](crate::host) or [`join`](crate::join).
/// Failures on one link after that are logged by the actor and never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Another node already hosts this room id.
    #[error("room {0} is already hosted")]
    AddressInUse(RoomId),

    /// Nobody answered at the room address in time.
    #[error("could not reach {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The host answered `reject`.
    #[error("join rejected: {reason}")]
    Rejected { reason: RejectReason },

    /// Only the host may do this.
    #[error("only the host can do that")]
    NotHost,

    /// This node has no profile yet.
    #[error("local profile is not set")]
    ProfileMissing,

    /// Another live participant holds the requested color.
    #[error("color {0} is taken")]
    ColorTaken(PlayerColor),

    #[error("need at least {need} players, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// The game engine refused the move.
    #[error("invalid move: {0}")]
    InvalidMove(#[from] MoveError),

    /// No open link to this peer.
    #[error("peer {0} is not connected")]
    UnknownPeer(PeerId),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The room actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// Returns `true` when trying the same join again might succeed.
    ///
    /// Only transient reachability problems qualify. A reject is the
    /// host's answer and does not change by asking again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoomError::ConnectFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_only_for_connect_failed() {
        assert!(
            RoomError::ConnectFailed {
                address: "r".into(),
                reason: "timeout".into()
            }
            .is_retryable()
        );
        assert!(
            !RoomError::Rejected {
                reason: RejectReason::RoomFull
            }
            .is_retryable()
        );
        assert!(!RoomError::AddressInUse(RoomId::new("r")).is_retryable());
        assert!(!RoomError::NotHost.is_retryable());
    }

    #[test]
    fn test_rejected_display_uses_wire_reason() {
        let err = RoomError::Rejected {
            reason: RejectReason::RoomFull,
        };
        assert_eq!(err.to_string(), "join rejected: room_full");
    }
}
