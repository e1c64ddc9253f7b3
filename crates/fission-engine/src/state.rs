//! Game state data: everything a `game-state-sync` snapshot carries.
//!
//! Field names match the browser peers (`playerId`, `moveHistory`, …) so
//! a snapshot can cross between implementations unchanged.

use std::fmt;

use fission_protocol::{PeerId, PlayerColor};
use serde::{Deserialize, Serialize};

use crate::MoveError;

/// Lifecycle of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
    /// Terminal until the host resets.
    Finished,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Playing => "playing",
            GameStatus::Finished => "finished",
        })
    }
}

/// Where a cell sits, which decides how many dots it holds before it
/// explodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Corner,
    Edge,
    Center,
}

impl CellKind {
    /// Dots a cell can hold. One more and it explodes.
    pub fn capacity(self) -> u32 {
        match self {
            CellKind::Corner => 1,
            CellKind::Edge => 2,
            CellKind::Center => 3,
        }
    }
}

/// One board cell. `dots > 0` exactly when `owner` is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub dots: u32,
    #[serde(rename = "playerId")]
    pub owner: Option<PeerId>,
    #[serde(rename = "playerColor")]
    pub color: Option<PlayerColor>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.dots == 0
    }

    pub(crate) fn clear(&mut self) {
        self.dots = 0;
        self.owner = None;
        self.color = None;
    }
}

/// One accepted move, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub player_id: PeerId,
    pub row: usize,
    pub col: usize,
    pub timestamp: u64,
}

/// The complete game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub rows: usize,
    pub cols: usize,
    /// `board[row][col]`.
    pub board: Vec<Vec<Cell>>,
    pub status: GameStatus,
    pub current_turn: Option<PeerId>,
    pub winner: Option<PeerId>,
    pub move_history: Vec<Move>,
    pub first_player: Option<PeerId>,
}

impl GameState {
    /// An empty board in the waiting state.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            board: vec![vec![Cell::default(); cols]; rows],
            status: GameStatus::Waiting,
            current_turn: None,
            winner: None,
            move_history: Vec::new(),
            first_player: None,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.board.get(row).and_then(|r| r.get(col))
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn cell_kind(&self, row: usize, col: usize) -> CellKind {
        let top_or_bottom = row == 0 || row + 1 == self.rows;
        let left_or_right = col == 0 || col + 1 == self.cols;
        match (top_or_bottom, left_or_right) {
            (true, true) => CellKind::Corner,
            (true, false) | (false, true) => CellKind::Edge,
            (false, false) => CellKind::Center,
        }
    }

    /// Sum of dots over the whole board.
    pub fn total_dots(&self) -> u32 {
        self.board.iter().flatten().map(|c| c.dots).sum()
    }

    /// Checks the shape and the dots/owner invariant of a received state.
    pub fn validate(&self) -> Result<(), MoveError> {
        if self.rows < 2 || self.cols < 2 {
            return Err(MoveError::InvalidSnapshot(format!(
                "board {}x{} is too small",
                self.rows, self.cols
            )));
        }
        if self.board.len() != self.rows || self.board.iter().any(|r| r.len() != self.cols) {
            return Err(MoveError::InvalidSnapshot(format!(
                "board does not match {}x{}",
                self.rows, self.cols
            )));
        }
        for (row, cells) in self.board.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if (cell.dots > 0) != cell.owner.is_some() {
                    return Err(MoveError::InvalidSnapshot(format!(
                        "cell ({row}, {col}) has {} dots and owner {:?}",
                        cell.dots, cell.owner
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_kind_on_4x4() {
        let state = GameState::new(4, 4);
        assert_eq!(state.cell_kind(0, 0), CellKind::Corner);
        assert_eq!(state.cell_kind(3, 3), CellKind::Corner);
        assert_eq!(state.cell_kind(0, 3), CellKind::Corner);
        assert_eq!(state.cell_kind(0, 1), CellKind::Edge);
        assert_eq!(state.cell_kind(2, 0), CellKind::Edge);
        assert_eq!(state.cell_kind(1, 1), CellKind::Center);
        assert_eq!(state.cell_kind(2, 2), CellKind::Center);
    }

    #[test]
    fn test_capacity_per_kind() {
        assert_eq!(CellKind::Corner.capacity(), 1);
        assert_eq!(CellKind::Edge.capacity(), 2);
        assert_eq!(CellKind::Center.capacity(), 3);
    }

    #[test]
    fn test_game_state_json_uses_browser_field_names() {
        let mut state = GameState::new(2, 2);
        state.board[0][0] = Cell {
            dots: 1,
            owner: Some(PeerId::new("p1")),
            color: Some(PlayerColor::Coral),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["board"][0][0]["playerId"], "p1");
        assert_eq!(json["board"][0][0]["playerColor"], "#FF6B6B");
        assert!(json["board"][0][1]["playerId"].is_null());
        assert!(json["currentTurn"].is_null());
        assert_eq!(json["moveHistory"], serde_json::json!([]));
    }

    #[test]
    fn test_validate_rejects_owner_without_dots() {
        let mut state = GameState::new(3, 3);
        state.board[1][1].owner = Some(PeerId::new("ghost"));
        assert!(matches!(state.validate(), Err(MoveError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_validate_rejects_ragged_board() {
        let mut state = GameState::new(3, 3);
        state.board[2].pop();
        assert!(matches!(state.validate(), Err(MoveError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_validate_accepts_fresh_board() {
        assert!(GameState::new(9, 6).validate().is_ok());
    }
}
