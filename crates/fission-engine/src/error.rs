use fission_protocol::PeerId;

use crate::GameStatus;

/// Why a move (or snapshot) was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// Moves are only accepted while the game is playing.
    #[error("game is not in progress (status: {0})")]
    NotPlaying(GameStatus),

    #[error("not {actual}'s turn (expected {expected:?})")]
    NotYourTurn {
        expected: Option<PeerId>,
        actual: PeerId,
    },

    #[error("cell ({row}, {col}) is outside the board")]
    OutOfBounds { row: usize, col: usize },

    /// The target cell belongs to another player.
    #[error("cell ({row}, {col}) is owned by {owner}")]
    CellOwned { row: usize, col: usize, owner: PeerId },

    /// `start_game` called outside the waiting state.
    #[error("cannot start a game that is {0}")]
    AlreadyStarted(GameStatus),

    /// A received snapshot breaks a board invariant.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
