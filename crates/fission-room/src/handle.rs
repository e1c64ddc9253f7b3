//! The handle side of the room actor: commands in, replies out.

use fission_engine::MoveOutcome;
use fission_protocol::{AppMessage, ChatMessage, PeerId, PlayerColor, Recipient, RoomId, UserProfile};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::{RoomError, RoomSnapshot};

/// Name and (optionally) color a node wants to play under.
///
/// Without a color the first free palette color is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSeed {
    pub display_name: String,
    pub color: Option<PlayerColor>,
}

impl ProfileSeed {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: PlayerColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// How to host a room.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub profile: Option<ProfileSeed>,
}

/// How to join a room.
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    /// The identity to listen under. If it is taken, a fresh one is used.
    pub preferred_identity: Option<PeerId>,

    pub profile: Option<ProfileSeed>,

    /// Ask the host for a full game snapshot once admitted.
    pub request_sync: bool,
}

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` are requests; the caller waits on the
/// `oneshot` for the actor's answer.
pub(crate) enum RoomCommand {
    Send {
        recipient: Recipient,
        message: AppMessage,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SetProfile {
        display_name: String,
        color: Option<PlayerColor>,
        reply: oneshot::Sender<Result<UserProfile, RoomError>>,
    },
    Chat {
        content: String,
        reply: oneshot::Sender<Result<Option<ChatMessage>, RoomError>>,
    },
    Typing {
        is_typing: bool,
    },
    StartGame {
        first: Option<PeerId>,
        reply: oneshot::Sender<Result<PeerId, RoomError>>,
    },
    SubmitMove {
        row: usize,
        col: usize,
        reply: oneshot::Sender<Result<MoveOutcome, RoomError>>,
    },
    NewGame {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    RequestSync {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running room actor.
///
/// Cheap to clone: it wraps an `mpsc::Sender`. When every handle is
/// dropped the actor leaves the room on its own.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    local_id: PeerId,
    is_host: bool,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, local_id: PeerId, is_host: bool, sender: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            room_id,
            local_id,
            is_host,
            sender,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// This node's identity in the room.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Returns `false` once the actor has stopped.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> RoomCommand) -> Result<R, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Broadcasts an application message to every open link.
    ///
    /// Best effort: a failed send to one peer is logged by the actor and
    /// never reported here.
    pub async fn send_to_all(&self, kind: impl Into<String>, payload: serde_json::Value) -> Result<(), RoomError> {
        let message = AppMessage::new(kind, payload);
        self.request(|reply| RoomCommand::Send {
            recipient: Recipient::All,
            message,
            reply,
        })
        .await?
    }

    /// Sends an application message to one peer.
    ///
    /// # Errors
    /// [`RoomError::UnknownPeer`] when there is no open link to `peer`.
    pub async fn send_to_peer(
        &self,
        peer: PeerId,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<(), RoomError> {
        let message = AppMessage::new(kind, payload);
        self.request(|reply| RoomCommand::Send {
            recipient: Recipient::Peer(peer),
            message,
            reply,
        })
        .await?
    }

    /// Sets this node's name and color and announces them.
    ///
    /// `None` keeps the current color (or picks a free one).
    ///
    /// # Errors
    /// [`RoomError::ColorTaken`] when another live participant holds `color`.
    pub async fn set_profile(
        &self,
        display_name: impl Into<String>,
        color: Option<PlayerColor>,
    ) -> Result<UserProfile, RoomError> {
        let display_name = display_name.into();
        self.request(|reply| RoomCommand::SetProfile {
            display_name,
            color,
            reply,
        })
        .await?
    }

    /// Posts a chat line. Blank lines are dropped and yield `None`.
    pub async fn send_chat(&self, content: impl Into<String>) -> Result<Option<ChatMessage>, RoomError> {
        let content = content.into();
        self.request(|reply| RoomCommand::Chat { content, reply }).await?
    }

    /// Shows or clears this node's typing indicator on other peers.
    pub async fn set_typing(&self, is_typing: bool) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Typing { is_typing })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Host only: starts the game. `None` picks the first player at random.
    /// Returns who moves first.
    pub async fn start_game(&self, first: Option<PeerId>) -> Result<PeerId, RoomError> {
        self.request(|reply| RoomCommand::StartGame { first, reply }).await?
    }

    /// Plays a move as this node, then hands the turn on.
    pub async fn submit_move(&self, row: usize, col: usize) -> Result<MoveOutcome, RoomError> {
        self.request(|reply| RoomCommand::SubmitMove { row, col, reply })
            .await?
    }

    /// Host only: resets the board and pushes it to everyone.
    pub async fn new_game(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::NewGame { reply }).await?
    }

    /// Asks the host for a full game snapshot.
    pub async fn request_sync(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RequestSync { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Announces departure, closes every link, and stops the actor. The
    /// listening address is released before this returns.
    pub async fn leave(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { reply }).await
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("local_id", &self.local_id)
            .field("is_host", &self.is_host)
            .finish()
    }
}
