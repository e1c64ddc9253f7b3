//! `PeerBuilder`: configure a node once, then host or join.

use std::time::Duration;

use fission_protocol::{PlayerColor, RoomId};
use fission_room::{EventReceiver, HostOptions, JoinOptions, ProfileSeed, RoomConfig, RoomHandle};
use fission_session::{RetryPolicy, SessionStore};
use fission_transport::Transport;

use crate::{FissionError, ReconnectionManager};

/// Builder for hosting or joining a room.
///
/// # Example
///
/// ```rust,no_run
/// use fission::prelude::*;
///
/// # async fn run() -> Result<(), FissionError> {
/// let net = MemoryNetwork::new();
/// let (room, mut events) = PeerBuilder::new(net)
///     .display_name("Ada")
///     .max_participants(3)
///     .host_new()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerBuilder<T: Transport> {
    transport: T,
    config: RoomConfig,
    display_name: Option<String>,
    color: Option<PlayerColor>,
    request_sync: bool,
}

impl<T: Transport> PeerBuilder<T> {
    /// Creates a builder with default room settings and no profile.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: RoomConfig::default(),
            display_name: None,
            color: None,
            request_sync: false,
        }
    }

    /// Replaces the whole room configuration.
    pub fn config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    /// Caps the room size, host included. Only matters when hosting.
    pub fn max_participants(mut self, max: usize) -> Self {
        self.config.max_participants = max;
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    pub fn board_size(mut self, rows: usize, cols: usize) -> Self {
        self.config.board_rows = rows;
        self.config.board_cols = cols;
        self
    }

    pub fn typing_timeout(mut self, timeout: Duration) -> Self {
        self.config.typing_timeout = timeout;
        self
    }

    /// Sets the name other players see. Without one the node joins
    /// without a profile and cannot chat or move until it sets one.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Asks for a color. A taken color is swapped for a free one on join.
    pub fn color(mut self, color: PlayerColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Asks the host for its board right after joining.
    pub fn request_sync(mut self, request_sync: bool) -> Self {
        self.request_sync = request_sync;
        self
    }

    fn profile(&self) -> Option<ProfileSeed> {
        self.display_name.clone().map(|name| ProfileSeed {
            display_name: name,
            color: self.color,
        })
    }

    /// Hosts `room_id`.
    pub async fn host(self, room_id: RoomId) -> Result<(RoomHandle, EventReceiver), FissionError> {
        let options = HostOptions {
            profile: self.profile(),
        };
        Ok(fission_room::host(self.transport, room_id, options, self.config).await?)
    }

    /// Hosts a room under a freshly generated id.
    pub async fn host_new(self) -> Result<(RoomHandle, EventReceiver), FissionError> {
        self.host(RoomId::generate()).await
    }

    /// Joins `room_id` once, without retries.
    pub async fn join(self, room_id: RoomId) -> Result<(RoomHandle, EventReceiver), FissionError> {
        let options = JoinOptions {
            preferred_identity: None,
            profile: self.profile(),
            request_sync: self.request_sync,
        };
        Ok(fission_room::join(self.transport, room_id, options, self.config).await?)
    }

    /// Turns this builder into a [`ReconnectionManager`] that keeps its
    /// session in `store`.
    pub fn reconnecting<S: SessionStore>(self, store: S, retry: RetryPolicy) -> ReconnectionManager<T, S> {
        ReconnectionManager::new(self.transport, store)
            .with_room_config(self.config)
            .with_retry_policy(retry)
    }
}
