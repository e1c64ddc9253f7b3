//! Chain Reaction rules for Fission.
//!
//! A pure state machine: no I/O, no clocks (timestamps are passed in), no
//! randomness. Every peer replays every move through the same
//! [`GameEngine::make_move`], so identical inputs must give identical
//! boards. That property is what keeps the mesh consistent without a
//! shared log.
//!
//! ```text
//! waiting ──start_game──▶ playing ──(one owner left)──▶ finished
//!    ▲                                                      │
//!    └──────────────────────── reset ───────────────────────┘
//! ```

mod engine;
mod error;
mod state;

pub use engine::{DEFAULT_COLS, DEFAULT_ROWS, GameEngine, MoveOutcome};
pub use error::MoveError;
pub use state::{Cell, CellKind, GameState, GameStatus, Move};
