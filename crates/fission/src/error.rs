//! Unified error type for Fission.

use fission_engine::MoveError;
use fission_protocol::ProtocolError;
use fission_room::RoomError;
use fission_session::SessionError;
use fission_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FissionError {
    /// A transport-level error (listen, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session storage failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Hosting, joining, or acting in a room failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Move(#[from] MoveError),
}

impl FissionError {
    /// Returns `true` when the same operation might succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FissionError::Room(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fission_engine::GameStatus;
    use fission_protocol::{RejectReason, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let fission_err: FissionError = err.into();
        assert!(matches!(fission_err, FissionError::Transport(_)));
        assert!(fission_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let fission_err: FissionError = err.into();
        assert!(matches!(fission_err, FissionError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Storage(std::io::Error::other("disk"));
        let fission_err: FissionError = err.into();
        assert!(matches!(fission_err, FissionError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::AddressInUse(RoomId::new("r"));
        let fission_err: FissionError = err.into();
        assert!(matches!(fission_err, FissionError::Room(_)));
    }

    #[test]
    fn test_from_move_error() {
        let err = MoveError::AlreadyStarted(GameStatus::Playing);
        let fission_err: FissionError = err.into();
        assert!(matches!(fission_err, FissionError::Move(_)));
    }

    #[test]
    fn test_is_retryable_follows_room_error() {
        let connect: FissionError = RoomError::ConnectFailed {
            address: "r".into(),
            reason: "timeout".into(),
        }
        .into();
        let rejected: FissionError = RoomError::Rejected {
            reason: RejectReason::RoomFull,
        }
        .into();
        assert!(connect.is_retryable());
        assert!(!rejected.is_retryable());
    }
}
