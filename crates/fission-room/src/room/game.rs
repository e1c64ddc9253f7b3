//! Game synchronization: local moves go out as `game-move`, remote ones
//! are replayed on the local engine, and the host's snapshot overrides
//! everything.
//!
//! Every peer runs the same deterministic engine over the same moves, so
//! boards agree without negotiation. When they don't (a dropped message,
//! a rejoin), `game-state-sync` from the host is the only repair.

use fission_engine::{GameState, GameStatus, MoveError, MoveOutcome};
use fission_protocol::{
    ControlMessage, PeerId, PlayerColor, ProtocolError, Recipient, UserProfile, unix_millis,
};
use fission_transport::Transport;
use rand::Rng;

use super::RoomActor;
use crate::{RoomError, RoomEvent};

/// How many early game messages a peer holds while waiting for `game-start`.
const MAX_EARLY_TRAFFIC: usize = 64;

/// Game traffic that reached a peer before the host's `game-start` did.
/// Links are independent, so a mover's first message can outrun the host.
pub(super) enum EarlyTraffic {
    Move {
        from: PeerId,
        row: usize,
        col: usize,
        player_id: PeerId,
        color: PlayerColor,
        timestamp: u64,
    },
    Turn {
        from: PeerId,
        player_id: PeerId,
    },
}

/// Participants in turn order: the host first, then by display name, then
/// by identity so equal names still order the same on every peer.
pub(crate) fn turn_order<'a>(profiles: impl IntoIterator<Item = &'a UserProfile>) -> Vec<PeerId> {
    let mut ordered: Vec<&UserProfile> = profiles.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.is_host
            .cmp(&a.is_host)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered.into_iter().map(|p| p.id.clone()).collect()
}

/// The participant after `current`, wrapping around. A `current` that is
/// not in `order` hands the turn to the first participant.
pub(crate) fn next_turn(order: &[PeerId], current: &PeerId) -> Option<PeerId> {
    if order.is_empty() {
        return None;
    }
    let next = match order.iter().position(|p| p == current) {
        Some(i) => (i + 1) % order.len(),
        None => 0,
    };
    order.get(next).cloned()
}

impl<T: Transport> RoomActor<T> {
    pub(super) fn turn_order(&self) -> Vec<PeerId> {
        turn_order(self.registry.profiles().values())
    }

    fn sync_message(&self) -> Result<ControlMessage, RoomError> {
        let state = serde_json::to_value(self.engine.snapshot()).map_err(ProtocolError::Encode)?;
        Ok(ControlMessage::GameStateSync {
            state,
            timestamp: unix_millis(),
        })
    }

    async fn pass_turn(&mut self, next: PeerId) {
        self.engine.set_current_turn(next.clone());
        let message = ControlMessage::NextTurn {
            player_id: next.clone(),
            timestamp: unix_millis(),
        };
        self.send_control(Recipient::All, &message).await;
        self.emit(RoomEvent::TurnChanged { player_id: next });
    }

    // -----------------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------------

    pub(super) async fn start_game(&mut self, first: Option<PeerId>) -> Result<PeerId, RoomError> {
        if !self.is_host {
            return Err(RoomError::NotHost);
        }
        let status = self.engine.status();
        if status != GameStatus::Waiting {
            return Err(MoveError::AlreadyStarted(status).into());
        }
        let order = self.turn_order();
        if order.len() < 2 {
            return Err(RoomError::NotEnoughPlayers {
                have: order.len(),
                need: 2,
            });
        }

        let first = match first {
            Some(first) if order.contains(&first) => first,
            Some(first) => return Err(RoomError::UnknownPeer(first)),
            None => order[rand::rng().random_range(0..order.len())].clone(),
        };
        self.engine.start_game(first.clone())?;

        tracing::info!(
            room_id = %self.room_id,
            first_player = %first,
            players = order.len(),
            "game started"
        );
        let message = ControlMessage::GameStart {
            first_player: first.clone(),
            timestamp: unix_millis(),
        };
        self.send_control(Recipient::All, &message).await;
        self.emit(RoomEvent::GameStarted {
            first_player: first.clone(),
        });
        Ok(first)
    }

    /// Validates and applies a local move, broadcasts it, then hands the
    /// turn to the next participant unless the move won.
    pub(super) async fn submit_move(&mut self, row: usize, col: usize) -> Result<MoveOutcome, RoomError> {
        let color = self
            .registry
            .local_profile()
            .map(|p| p.color)
            .ok_or(RoomError::ProfileMissing)?;
        let local = self.local_id().clone();
        let timestamp = unix_millis();

        let outcome = self.engine.make_move(row, col, &local, color, timestamp)?;
        let message = ControlMessage::GameMove {
            row,
            col,
            player_id: local.clone(),
            color,
            timestamp,
        };
        self.send_control(Recipient::All, &message).await;
        self.emit(RoomEvent::MoveApplied {
            player_id: local.clone(),
            row,
            col,
            outcome: outcome.clone(),
        });

        if outcome.winner.is_none() {
            if let Some(next) = next_turn(&self.turn_order(), &local) {
                self.pass_turn(next).await;
            }
        }
        Ok(outcome)
    }

    /// Host only: back to an empty waiting board, pushed to everyone.
    pub(super) async fn new_game(&mut self) -> Result<(), RoomError> {
        if !self.is_host {
            return Err(RoomError::NotHost);
        }
        self.engine.reset();
        let message = self.sync_message()?;
        self.send_control(Recipient::All, &message).await;
        tracing::info!(room_id = %self.room_id, "new game");
        self.emit(RoomEvent::StateSynced {
            status: self.engine.status(),
        });
        Ok(())
    }

    pub(super) async fn request_sync(&mut self) -> Result<(), RoomError> {
        if self.is_host {
            return Ok(());
        }
        let host = self.host_id();
        if !self.registry.is_open(&host) {
            return Err(RoomError::UnknownPeer(host));
        }
        self.send_control(Recipient::Peer(host), &ControlMessage::SyncRequest)
            .await;
        Ok(())
    }

    /// Host only: when the departed peer held the turn, pass it on so the
    /// game does not stall. `order` is the turn order from before the
    /// departure.
    pub(super) async fn hand_off_turn(&mut self, departed: &PeerId, order: &[PeerId]) {
        if !self.is_host
            || self.engine.status() != GameStatus::Playing
            || self.engine.current_turn() != Some(departed)
        {
            return;
        }
        let Some(next) = next_turn(order, departed) else {
            return;
        };
        if self.registry.profile(&next).is_none() {
            return;
        }
        tracing::info!(%departed, %next, "turn holder left, passing the turn");
        self.pass_turn(next).await;
    }

    // -----------------------------------------------------------------------
    // Remote traffic
    // -----------------------------------------------------------------------

    /// Peers hold game traffic until the game starts. The host never
    /// does: its own `game-start` is what starts the game.
    fn holds_early_traffic(&self) -> bool {
        !self.is_host && self.engine.status() == GameStatus::Waiting
    }

    fn hold_early(&mut self, traffic: EarlyTraffic) {
        if self.early.len() >= MAX_EARLY_TRAFFIC {
            tracing::warn!(held = self.early.len(), "too much game traffic before game-start, dropping");
            return;
        }
        tracing::debug!(held = self.early.len() + 1, "game traffic before game-start, holding");
        self.early.push(traffic);
    }

    /// Asks the host for its snapshot after dropping game traffic that did
    /// not fit the local board.
    async fn repair_from_host(&mut self) {
        if self.is_host {
            return;
        }
        tracing::info!(room_id = %self.room_id, "game state out of step, asking the host");
        if let Err(e) = self.request_sync().await {
            tracing::warn!(error = %e, "sync-request not sent");
        }
    }

    pub(super) async fn on_game_start(&mut self, from: PeerId, first_player: PeerId) {
        if from != self.host_id() {
            tracing::warn!(%from, "game-start from a non-host, dropping");
            return;
        }
        if self.engine.status() != GameStatus::Waiting {
            self.engine.reset();
        }
        if let Err(e) = self.engine.start_game(first_player.clone()) {
            tracing::warn!(error = %e, "game-start not applied");
            return;
        }
        tracing::info!(room_id = %self.room_id, %first_player, "game started by host");
        self.emit(RoomEvent::GameStarted { first_player });

        for traffic in std::mem::take(&mut self.early) {
            match traffic {
                EarlyTraffic::Move {
                    from,
                    row,
                    col,
                    player_id,
                    color,
                    timestamp,
                } => self.on_game_move(from, row, col, player_id, color, timestamp).await,
                EarlyTraffic::Turn { from, player_id } => self.on_next_turn(from, player_id).await,
            }
        }
    }

    /// Replays a peer's move. The mover checked the turn before sending and
    /// turn updates can arrive out of order on other links, so the turn is
    /// granted to the mover here. Board rules still apply.
    pub(super) async fn on_game_move(
        &mut self,
        from: PeerId,
        row: usize,
        col: usize,
        player_id: PeerId,
        color: PlayerColor,
        timestamp: u64,
    ) {
        if player_id != from {
            tracing::warn!(%from, %player_id, "game-move for another player, dropping");
            return;
        }
        if self.holds_early_traffic() {
            self.hold_early(EarlyTraffic::Move {
                from,
                row,
                col,
                player_id,
                color,
                timestamp,
            });
            return;
        }
        let seen = self.engine.state().move_history.iter().any(|m| {
            m.player_id == player_id && m.timestamp == timestamp && m.row == row && m.col == col
        });
        if seen {
            tracing::debug!(%player_id, row, col, "move already applied");
            return;
        }
        if self.engine.status() == GameStatus::Playing {
            self.engine.set_current_turn(player_id.clone());
        }
        match self.engine.make_move(row, col, &player_id, color, timestamp) {
            Ok(outcome) => {
                tracing::debug!(%player_id, row, col, explosions = outcome.explosions.len(), "remote move applied");
                self.emit(RoomEvent::MoveApplied {
                    player_id,
                    row,
                    col,
                    outcome,
                });
            }
            Err(e) => {
                tracing::warn!(%from, row, col, error = %e, "dropping invalid remote move");
                self.repair_from_host().await;
            }
        }
    }

    pub(super) fn on_state_sync(&mut self, from: PeerId, state: serde_json::Value) {
        if from != self.host_id() {
            tracing::warn!(%from, "game-state-sync from a non-host, dropping");
            return;
        }
        let state: GameState = match serde_json::from_value(state) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable game-state-sync");
                return;
            }
        };
        if let Err(e) = self.engine.apply_snapshot(state) {
            tracing::warn!(error = %e, "game-state-sync rejected");
            return;
        }
        // The snapshot already holds whatever was waiting for game-start.
        self.early.clear();
        tracing::info!(status = %self.engine.status(), "game state synced from host");
        self.emit(RoomEvent::StateSynced {
            status: self.engine.status(),
        });
    }

    /// Accepted from the last mover, whose turn just ended, or from the
    /// host. A late `next-turn` from an earlier mover is stale. One from a
    /// peer with no move on the local board means that move never arrived.
    pub(super) async fn on_next_turn(&mut self, from: PeerId, player_id: PeerId) {
        if self.holds_early_traffic() {
            self.hold_early(EarlyTraffic::Turn { from, player_id });
            return;
        }
        let history = &self.engine.state().move_history;
        if from != self.host_id() && history.last().map(|m| &m.player_id) != Some(&from) {
            if history.iter().any(|m| m.player_id == from) {
                tracing::debug!(%from, %player_id, "stale next-turn ignored");
            } else {
                tracing::warn!(%from, %player_id, "next-turn without the sender's move");
                self.repair_from_host().await;
            }
            return;
        }
        self.engine.set_current_turn(player_id.clone());
        self.emit(RoomEvent::TurnChanged { player_id });
    }

    pub(super) async fn on_sync_request(&mut self, from: PeerId) {
        if !self.is_host {
            tracing::debug!(%from, "sync-request on a non-host, ignoring");
            return;
        }
        match self.sync_message() {
            Ok(message) => {
                tracing::debug!(%from, "answering sync-request");
                self.send_control(Recipient::Peer(from), &message).await;
            }
            Err(e) => tracing::warn!(error = %e, "snapshot not encoded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, name: &str) -> UserProfile {
        UserProfile::new(PeerId::new(id), name, PlayerColor::Coral)
    }

    fn ids(ids: &[&str]) -> Vec<PeerId> {
        ids.iter().map(|id| PeerId::new(*id)).collect()
    }

    // =====================================================================
    // turn_order
    // =====================================================================

    #[test]
    fn test_turn_order_host_first_then_by_name() {
        let profiles = [
            profile("p-3", "Cleo"),
            profile("p-1", "Ada"),
            profile("room", "Zed").host(),
        ];
        assert_eq!(turn_order(&profiles), ids(&["room", "p-1", "p-3"]));
    }

    #[test]
    fn test_turn_order_equal_names_break_ties_by_id() {
        let profiles = [profile("b", "Sam"), profile("a", "Sam")];
        assert_eq!(turn_order(&profiles), ids(&["a", "b"]));
    }

    #[test]
    fn test_turn_order_empty_is_empty() {
        assert!(turn_order(&Vec::<UserProfile>::new()).is_empty());
    }

    // =====================================================================
    // next_turn
    // =====================================================================

    #[test]
    fn test_next_turn_advances_and_wraps() {
        let order = ids(&["a", "b", "c"]);
        assert_eq!(next_turn(&order, &PeerId::new("a")), Some(PeerId::new("b")));
        assert_eq!(next_turn(&order, &PeerId::new("c")), Some(PeerId::new("a")));
    }

    #[test]
    fn test_next_turn_unknown_current_starts_from_first() {
        let order = ids(&["a", "b"]);
        assert_eq!(next_turn(&order, &PeerId::new("gone")), Some(PeerId::new("a")));
    }

    #[test]
    fn test_next_turn_empty_order_returns_none() {
        assert_eq!(next_turn(&[], &PeerId::new("a")), None);
    }

    #[test]
    fn test_next_turn_single_player_returns_self() {
        let order = ids(&["a"]);
        assert_eq!(next_turn(&order, &PeerId::new("a")), Some(PeerId::new("a")));
    }
}
