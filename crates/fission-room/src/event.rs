//! What the room tells the embedding application.

use fission_engine::{GameState, GameStatus, MoveOutcome};
use fission_protocol::{ChatMessage, Inbound, PeerId, PlayerColor, RoomId, UserProfile};
use tokio::sync::mpsc;

/// Receives every [`RoomEvent`] of one room, in the order the actor
/// produced them. Dropping it is fine; events are then discarded.
pub type EventReceiver = mpsc::UnboundedReceiver<RoomEvent>;

/// Something happened in the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// A peer was admitted (host) or announced (everyone else).
    PeerJoined {
        peer_id: PeerId,
        profile: Option<UserProfile>,
    },

    /// A peer is gone. Its color is free again.
    PeerLeft {
        peer_id: PeerId,
        profile: Option<UserProfile>,
    },

    ProfileUpdated { profile: UserProfile },

    /// A chat line, local ones included.
    Chat { message: ChatMessage, timestamp: u64 },

    Typing {
        peer_id: PeerId,
        name: String,
        is_typing: bool,
    },

    GameStarted { first_player: PeerId },

    /// A move was applied to the local board, by us or by a peer.
    MoveApplied {
        player_id: PeerId,
        row: usize,
        col: usize,
        outcome: MoveOutcome,
    },

    TurnChanged { player_id: PeerId },

    /// The board was overwritten by a host snapshot.
    StateSynced { status: GameStatus },

    /// Application traffic from a peer: structured or opaque.
    Message { from: PeerId, message: Inbound },
}

/// One line of the chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub message: ChatMessage,
    pub timestamp: u64,
}

/// A point-in-time copy of everything the room actor knows.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub local_id: PeerId,
    pub is_host: bool,
    /// Everyone with a profile, in turn order.
    pub participants: Vec<UserProfile>,
    /// Peers with an open direct link.
    pub connected: Vec<PeerId>,
    pub game: GameState,
    pub available_colors: Vec<PlayerColor>,
    pub chat: Vec<ChatEntry>,
    /// Peers currently shown as typing.
    pub typing: Vec<PeerId>,
}

impl RoomSnapshot {
    pub fn participant(&self, peer_id: &PeerId) -> Option<&UserProfile> {
        self.participants.iter().find(|p| &p.id == peer_id)
    }

    pub fn local_profile(&self) -> Option<&UserProfile> {
        self.participant(&self.local_id)
    }

    /// Returns `true` when it is this node's move.
    pub fn is_my_turn(&self) -> bool {
        self.game.current_turn.as_ref() == Some(&self.local_id)
    }
}
