//! Move validation, chain-reaction propagation, and winner detection.

use std::collections::{BTreeSet, VecDeque};

use fission_protocol::{PeerId, PlayerColor};

use crate::{CellKind, GameState, GameStatus, Move, MoveError};

pub const DEFAULT_ROWS: usize = 9;
pub const DEFAULT_COLS: usize = 6;

/// Explosions allowed per move, per board cell. Only a board nobody can
/// win (a single player filling it) ever gets near this.
const EXPLOSIONS_PER_CELL: usize = 64;

/// Neighbor offsets in propagation order: up, down, left, right.
/// Changing the order changes which cell explodes first, so every peer
/// must use the same one.
const DIRECTIONS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// What one accepted move did to the board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// Cells in the order they exploded. A cell can appear more than once.
    pub explosions: Vec<(usize, usize)>,
    /// Set when this move finished the game.
    pub winner: Option<PeerId>,
}

/// Owns one [`GameState`] and applies the rules to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEngine {
    state: GameState,
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl GameEngine {
    /// A waiting game on an empty `rows × cols` board. Boards smaller
    /// than 2×2 have cells that can never shed dots, so both dimensions
    /// are raised to at least 2.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            state: GameState::new(rows.max(2), cols.max(2)),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn current_turn(&self) -> Option<&PeerId> {
        self.state.current_turn.as_ref()
    }

    /// Clears the board and returns to `waiting`, keeping the dimensions.
    pub fn reset(&mut self) {
        self.state = GameState::new(self.state.rows, self.state.cols);
    }

    /// `waiting → playing`, with `first` to move.
    pub fn start_game(&mut self, first: PeerId) -> Result<(), MoveError> {
        if self.state.status != GameStatus::Waiting {
            return Err(MoveError::AlreadyStarted(self.state.status));
        }
        self.state.status = GameStatus::Playing;
        self.state.current_turn = Some(first.clone());
        self.state.first_player = Some(first);
        self.state.winner = None;
        Ok(())
    }

    pub fn cell_kind(&self, row: usize, col: usize) -> CellKind {
        self.state.cell_kind(row, col)
    }

    pub fn capacity(&self, row: usize, col: usize) -> u32 {
        self.cell_kind(row, col).capacity()
    }

    /// Checks a move without applying it.
    pub fn validate_move(&self, row: usize, col: usize, player: &PeerId) -> Result<(), MoveError> {
        if self.state.status != GameStatus::Playing {
            return Err(MoveError::NotPlaying(self.state.status));
        }
        if self.state.current_turn.as_ref() != Some(player) {
            return Err(MoveError::NotYourTurn {
                expected: self.state.current_turn.clone(),
                actual: player.clone(),
            });
        }
        let cell = self
            .state
            .cell(row, col)
            .ok_or(MoveError::OutOfBounds { row, col })?;
        match &cell.owner {
            Some(owner) if owner != player => Err(MoveError::CellOwned {
                row,
                col,
                owner: owner.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Validates and applies a move, running every explosion it causes.
    ///
    /// An exploding cell hands one dot to each in-bounds neighbor and
    /// loses exactly that many, so the board always gains exactly one dot
    /// per move. Neighbors are captured by the mover. Propagation stops as
    /// soon as the mover holds every dot on the board and the game has a
    /// second player, because nothing further can change the winner.
    ///
    /// The turn is not advanced here; the caller decides who goes next.
    pub fn make_move(
        &mut self,
        row: usize,
        col: usize,
        player: &PeerId,
        color: PlayerColor,
        timestamp: u64,
    ) -> Result<MoveOutcome, MoveError> {
        self.validate_move(row, col, player)?;

        let cell = &mut self.state.board[row][col];
        cell.dots += 1;
        cell.owner = Some(player.clone());
        cell.color = Some(color);

        self.state.move_history.push(Move {
            player_id: player.clone(),
            row,
            col,
            timestamp,
        });

        let contested = self.distinct_movers() >= 2;
        let mut opponent_dots = self.dots_not_owned_by(player);
        let budget = self.state.rows * self.state.cols * EXPLOSIONS_PER_CELL;
        let mut explosions = Vec::new();

        let mut queue = VecDeque::new();
        if self.state.board[row][col].dots > self.capacity(row, col) {
            queue.push_back((row, col));
        }

        while let Some((r, c)) = queue.pop_front() {
            if contested && opponent_dots == 0 {
                break;
            }
            let capacity = self.capacity(r, c);
            if self.state.board[r][c].dots <= capacity {
                // Already exploded since it was queued.
                continue;
            }
            if explosions.len() >= budget {
                tracing::warn!(row, col, budget, "explosion budget exhausted");
                break;
            }

            let neighbors = self.neighbors(r, c);
            let exploding = &mut self.state.board[r][c];
            exploding.dots -= neighbors.len() as u32;
            if exploding.dots == 0 {
                exploding.clear();
            }
            explosions.push((r, c));

            for (nr, nc) in neighbors {
                let neighbor_capacity = self.capacity(nr, nc);
                let neighbor = &mut self.state.board[nr][nc];
                if neighbor.owner.as_ref().is_some_and(|owner| owner != player) {
                    opponent_dots -= neighbor.dots;
                }
                neighbor.dots += 1;
                neighbor.owner = Some(player.clone());
                neighbor.color = Some(color);
                if neighbor.dots > neighbor_capacity {
                    queue.push_back((nr, nc));
                }
            }

            if self.state.board[r][c].dots > capacity {
                queue.push_back((r, c));
            }
        }

        let winner = self.check_winner();
        if let Some(winner) = &winner {
            tracing::info!(%winner, moves = self.state.move_history.len(), "game finished");
            self.state.winner = Some(winner.clone());
            self.state.status = GameStatus::Finished;
        }

        Ok(MoveOutcome { explosions, winner })
    }

    /// The only player holding dots, once at least two players have moved.
    pub fn check_winner(&self) -> Option<PeerId> {
        if self.distinct_movers() < 2 {
            return None;
        }
        let owners: BTreeSet<&PeerId> = self
            .state
            .board
            .iter()
            .flatten()
            .filter(|cell| cell.dots > 0)
            .filter_map(|cell| cell.owner.as_ref())
            .collect();
        let mut owners = owners.into_iter();
        match (owners.next(), owners.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }

    pub fn set_current_turn(&mut self, player: PeerId) {
        self.state.current_turn = Some(player);
    }

    pub fn set_first_player(&mut self, player: PeerId) {
        self.state.first_player = Some(player);
    }

    /// A full copy of the state for `game-state-sync`.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Replaces the whole state. Applying the same snapshot twice is the
    /// same as applying it once.
    pub fn apply_snapshot(&mut self, state: GameState) -> Result<(), MoveError> {
        state.validate()?;
        self.state = state;
        Ok(())
    }

    pub fn total_dots(&self) -> u32 {
        self.state.total_dots()
    }

    fn distinct_movers(&self) -> usize {
        self.state
            .move_history
            .iter()
            .map(|m| &m.player_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn dots_not_owned_by(&self, player: &PeerId) -> u32 {
        self.state
            .board
            .iter()
            .flatten()
            .filter(|cell| cell.owner.as_ref().is_some_and(|owner| owner != player))
            .map(|cell| cell.dots)
            .sum()
    }

    fn neighbors(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        DIRECTIONS
            .iter()
            .filter_map(|&(dr, dc)| {
                let r = row.checked_add_signed(dr)?;
                let c = col.checked_add_signed(dc)?;
                self.state.in_bounds(r, c).then_some((r, c))
            })
            .collect()
    }
}
