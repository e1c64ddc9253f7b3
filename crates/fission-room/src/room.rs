//! Room actor: one Tokio task per joined or hosted room.
//!
//! The actor owns the connection registry, the game engine, and the chat
//! state. Nothing else touches them. Three kinds of input reach it, all
//! through channels:
//!
//! - commands from [`RoomHandle`](crate::RoomHandle)s,
//! - network events from the accept loop, per-link reader tasks, and
//!   mesh dial tasks,
//! - timer expiries (typing indicators).
//!
//! Each input is handled to completion before the next one is taken, so
//! no handler ever observes another one half-done.

mod chat;
mod game;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;

use fission_engine::GameEngine;
use fission_protocol::{
    AppMessage, Codec, ControlMessage, Inbound, JsonCodec, PeerId, PlayerColor, Recipient, RejectReason,
    RoomId, UserProfile,
};
use fission_transport::{Connection, ConnectionId, Listener, Transport, TransportError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinSet};

use crate::handle::RoomCommand;
use crate::{
    ChatEntry, ConnectionRegistry, ConnectionState, EventReceiver, RoomConfig, RoomError,
    RoomEvent, RoomHandle, RoomSnapshot,
};

/// Network-side input to the actor.
pub(crate) enum NetEvent<C> {
    /// The listener accepted a link.
    Accepted(C),
    /// A mesh dial finished.
    Dialed {
        peer: PeerId,
        result: Result<C, TransportError>,
    },
    /// One payload from `peer`'s link `conn_id`.
    Data {
        peer: PeerId,
        conn_id: ConnectionId,
        data: Vec<u8>,
    },
    /// `peer`'s link `conn_id` is gone, cleanly or not.
    Closed {
        peer: PeerId,
        conn_id: ConnectionId,
        error: Option<TransportError>,
    },
    TypingExpired { peer: PeerId, generation: u64 },
    /// Host only: `peer`'s link `conn_id` has had `join_timeout` to send
    /// `join`.
    AdmissionExpired { peer: PeerId, conn_id: ConnectionId },
}

/// The internal room actor state. Runs inside a Tokio task.
pub(crate) struct RoomActor<T: Transport> {
    room_id: RoomId,
    is_host: bool,
    config: RoomConfig,
    codec: JsonCodec,
    transport: T,
    registry: ConnectionRegistry<T::Connection>,
    engine: GameEngine,
    /// Game traffic waiting for the host's `game-start`.
    early: Vec<game::EarlyTraffic>,
    chat: VecDeque<ChatEntry>,
    typing: BTreeMap<PeerId, chat::TypingIndicator>,
    typing_generation: u64,
    /// Mesh dials in flight.
    dialing: BTreeSet<PeerId>,
    /// Accept loop, readers, dials, and timers. Aborted on shutdown.
    tasks: JoinSet<()>,
    commands: mpsc::Receiver<RoomCommand>,
    net_tx: mpsc::UnboundedSender<NetEvent<T::Connection>>,
    net_rx: mpsc::UnboundedReceiver<NetEvent<T::Connection>>,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl<T: Transport> RoomActor<T> {
    pub(crate) fn new(
        transport: T,
        room_id: RoomId,
        is_host: bool,
        config: RoomConfig,
        registry: ConnectionRegistry<T::Connection>,
    ) -> (Self, RoomHandle, EventReceiver) {
        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (net_tx, net_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle::new(
            room_id.clone(),
            registry.local_id().clone(),
            is_host,
            command_tx,
        );

        let actor = Self {
            engine: GameEngine::new(config.board_rows, config.board_cols),
            room_id,
            is_host,
            config,
            codec: JsonCodec,
            transport,
            registry,
            early: Vec::new(),
            chat: VecDeque::new(),
            typing: BTreeMap::new(),
            typing_generation: 0,
            dialing: BTreeSet::new(),
            tasks: JoinSet::new(),
            commands,
            net_tx,
            net_rx,
            events,
        };
        (actor, handle, event_rx)
    }

    fn local_id(&self) -> &PeerId {
        self.registry.local_id()
    }

    /// The host listens on the room id, so that is its identity.
    fn host_id(&self) -> PeerId {
        self.room_id.as_peer_id()
    }

    fn emit(&self, event: RoomEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Runs the actor loop until `leave` or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!(
            room_id = %self.room_id,
            local_id = %self.local_id(),
            is_host = self.is_host,
            "room actor started"
        );

        let leave_reply = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle_command(command).await {
                            break Some(reply);
                        }
                    }
                    None => break None,
                },
                Some(event) = self.net_rx.recv() => self.handle_net(event).await,
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {}
            }
        };

        self.shutdown().await;
        if let Some(reply) = leave_reply {
            let _ = reply.send(());
        }
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    async fn handle_command(&mut self, command: RoomCommand) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            RoomCommand::Send {
                recipient,
                message,
                reply,
            } => {
                let result = self.send_app(recipient, message).await;
                let _ = reply.send(result);
            }
            RoomCommand::SetProfile {
                display_name,
                color,
                reply,
            } => {
                let result = self.set_profile(display_name, color).await;
                let _ = reply.send(result);
            }
            RoomCommand::Chat { content, reply } => {
                let result = self.send_chat(content).await;
                let _ = reply.send(result);
            }
            RoomCommand::Typing { is_typing } => self.set_typing(is_typing).await,
            RoomCommand::StartGame { first, reply } => {
                let result = self.start_game(first).await;
                let _ = reply.send(result);
            }
            RoomCommand::SubmitMove { row, col, reply } => {
                let result = self.submit_move(row, col).await;
                let _ = reply.send(result);
            }
            RoomCommand::NewGame { reply } => {
                let result = self.new_game().await;
                let _ = reply.send(result);
            }
            RoomCommand::RequestSync { reply } => {
                let result = self.request_sync().await;
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Leave { reply } => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    async fn handle_net(&mut self, event: NetEvent<T::Connection>) {
        match event {
            NetEvent::Accepted(conn) => self.on_accepted(conn).await,
            NetEvent::Dialed { peer, result } => self.on_dialed(peer, result).await,
            NetEvent::Data {
                peer,
                conn_id,
                data,
            } => {
                if !self.registry.is_current(&peer, conn_id) {
                    tracing::debug!(%peer, %conn_id, "dropping data from a replaced link");
                    return;
                }
                self.on_data(peer, data).await;
            }
            NetEvent::Closed {
                peer,
                conn_id,
                error,
            } => {
                if !self.registry.is_current(&peer, conn_id) {
                    return;
                }
                match error {
                    Some(e) => tracing::warn!(%peer, %conn_id, error = %e, "link failed"),
                    None => tracing::debug!(%peer, %conn_id, "link closed"),
                }
                self.depart(&peer, true).await;
            }
            NetEvent::TypingExpired { peer, generation } => {
                self.on_typing_expired(&peer, generation);
            }
            NetEvent::AdmissionExpired { peer, conn_id } => {
                if self.registry.is_current(&peer, conn_id) && !self.registry.is_open(&peer) {
                    tracing::info!(%peer, %conn_id, "no join in time, closing link");
                    self.depart(&peer, false).await;
                }
            }
        }
    }

    /// Broadcasts `peer-left` for ourselves, closes every link, and stops
    /// every task. Dropping the accept loop releases the listening address.
    async fn shutdown(&mut self) {
        self.commands.close();
        let local = self.local_id().clone();
        self.send_control(Recipient::All, &ControlMessage::PeerLeft { peer_id: local })
            .await;
        for entry in self.registry.drain() {
            let _ = entry.connection().close().await;
        }
        self.typing.clear();
        self.dialing.clear();
        self.tasks.shutdown().await;
        tracing::info!(room_id = %self.room_id, "left room");
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Starts the task that hands every inbound link to the actor.
    pub(crate) fn spawn_accept_loop(&mut self, mut listener: T::Listener) {
        let net_tx = self.net_tx.clone();
        self.tasks.spawn(async move {
            loop {
                match listener.accept().await {
                    Ok(conn) => {
                        if net_tx.send(NetEvent::Accepted(conn)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            address = listener.local_address(),
                            error = %e,
                            "listener stopped accepting"
                        );
                        return;
                    }
                }
            }
        });
    }

    fn spawn_reader(&mut self, peer: PeerId, conn: Arc<T::Connection>) -> AbortHandle {
        let net_tx = self.net_tx.clone();
        self.tasks.spawn(async move {
            let conn_id = conn.id();
            loop {
                match conn.recv().await {
                    Ok(Some(data)) => {
                        let event = NetEvent::Data {
                            peer: peer.clone(),
                            conn_id,
                            data,
                        };
                        if net_tx.send(event).is_err() {
                            return;
                        }
                    }
                    result => {
                        let error = result.err();
                        let _ = net_tx.send(NetEvent::Closed {
                            peer,
                            conn_id,
                            error,
                        });
                        return;
                    }
                }
            }
        })
    }

    /// Registers a link to `peer` and starts reading it.
    ///
    /// When an open link to `peer` already exists and the two were dialed
    /// from opposite ends, the one dialed by the smaller identity wins on
    /// both sides. A link dialed from the same end as the existing one
    /// replaces it. Returns `false` if the new link lost and was closed.
    pub(crate) async fn adopt(
        &mut self,
        peer: PeerId,
        conn: T::Connection,
        state: ConnectionState,
        dialed_by: PeerId,
    ) -> bool {
        let keeper = std::cmp::min(self.local_id(), &peer).clone();
        let existing_wins = self.registry.get(&peer).is_some_and(|existing| {
            existing.state().is_open()
                && existing.dialed_by() != &dialed_by
                && existing.dialed_by() == &keeper
        });
        if existing_wins {
            tracing::debug!(%peer, %dialed_by, "duplicate link, keeping the existing one");
            let _ = conn.close().await;
            return false;
        }

        let conn = Arc::new(conn);
        if let Some(replaced) =
            self.registry
                .insert(peer.clone(), Arc::clone(&conn), state, dialed_by)
        {
            tracing::debug!(%peer, old = %replaced.connection_id(), new = %conn.id(), "link replaced");
            let _ = replaced.connection().close().await;
        }
        let reader = self.spawn_reader(peer.clone(), conn);
        self.registry.set_reader(&peer, reader);
        true
    }

    async fn on_accepted(&mut self, conn: T::Connection) {
        let peer = PeerId::new(conn.remote_address());
        // The host admits links with `join`; mesh links are live at once.
        let state = if self.is_host {
            ConnectionState::Connecting
        } else {
            ConnectionState::Open
        };
        let conn_id = conn.id();
        tracing::debug!(%peer, %conn_id, %state, "link accepted");

        if !self.adopt(peer.clone(), conn, state, peer.clone()).await {
            return;
        }
        if state.is_open() {
            self.introduce(&peer).await;
        } else {
            self.expect_join(peer, conn_id);
        }
    }

    /// Closes `peer`'s link unless it is admitted within `join_timeout`.
    fn expect_join(&mut self, peer: PeerId, conn_id: ConnectionId) {
        let net_tx = self.net_tx.clone();
        let timeout = self.config.join_timeout;
        self.tasks.spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = net_tx.send(NetEvent::AdmissionExpired { peer, conn_id });
        });
    }

    /// Opens a mesh link to `peer` in the background.
    ///
    /// Only the smaller identity of each pair dials, so two peers that
    /// learn about each other at the same time still end up with one link.
    fn dial(&mut self, peer: PeerId) {
        let local = self.local_id().clone();
        if peer == local || self.registry.contains(&peer) || self.dialing.contains(&peer) {
            return;
        }
        if local > peer {
            tracing::debug!(%peer, "expecting the mesh dial from the other side");
            return;
        }

        self.dialing.insert(peer.clone());
        let transport = self.transport.clone();
        let net_tx = self.net_tx.clone();
        let timeout = self.config.join_timeout;
        self.tasks.spawn(async move {
            let connect = transport.connect(local.as_str(), peer.as_str());
            let result = match tokio::time::timeout(timeout, connect).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Unreachable(peer.to_string())),
            };
            let _ = net_tx.send(NetEvent::Dialed { peer, result });
        });
    }

    async fn on_dialed(&mut self, peer: PeerId, result: Result<T::Connection, TransportError>) {
        self.dialing.remove(&peer);
        match result {
            Ok(conn) => {
                let local = self.local_id().clone();
                if self.adopt(peer.clone(), conn, ConnectionState::Open, local).await {
                    tracing::info!(room_id = %self.room_id, %peer, "mesh link open");
                    self.introduce(&peer).await;
                }
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "mesh dial failed, continuing with a partial mesh");
            }
        }
    }

    /// Sends our profile over a fresh mesh link.
    async fn introduce(&self, peer: &PeerId) {
        if let Some(profile) = self.registry.local_profile() {
            let message = ControlMessage::UserUpdate {
                profile: profile.clone(),
            };
            self.send_control(Recipient::Peer(peer.clone()), &message).await;
        }
    }

    /// Takes in a `peer-list`: remembers every profile and dials every peer.
    pub(crate) fn merge_peer_list(&mut self, peers: Vec<PeerId>, profiles: BTreeMap<PeerId, UserProfile>) {
        let local = self.local_id().clone();
        for profile in profiles.into_values().filter(|p| p.id != local) {
            self.registry.set_profile(profile);
        }
        for peer in peers {
            self.dial(peer);
        }
    }

    /// Drops `peer`'s link and profile, frees its color, and tells the
    /// others when the link was admitted.
    async fn depart(&mut self, peer: &PeerId, announce: bool) {
        let was_open = self.registry.is_open(peer);
        let order = self.turn_order();
        let Some((entry, profile)) = self.registry.remove(peer) else {
            return;
        };
        let _ = entry.connection().close().await;
        drop(entry);
        self.clear_typing(peer);

        if !was_open {
            tracing::debug!(%peer, "unadmitted link dropped");
            return;
        }

        tracing::info!(
            room_id = %self.room_id,
            %peer,
            remaining = self.registry.open_count(),
            "peer left"
        );
        if announce {
            let message = ControlMessage::PeerLeft {
                peer_id: peer.clone(),
            };
            self.send_control(Recipient::All, &message).await;
        }
        self.emit(RoomEvent::PeerLeft {
            peer_id: peer.clone(),
            profile,
        });
        self.hand_off_turn(peer, &order).await;
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends a control message. Encoding and per-peer send failures are
    /// logged, never returned.
    pub(crate) async fn send_control(&self, to: Recipient, message: &ControlMessage) {
        match self.codec.encode(message) {
            Ok(bytes) => {
                self.broadcast(&to, &bytes, message.kind()).await;
            }
            Err(e) => tracing::warn!(kind = message.kind(), error = %e, "control message not encoded"),
        }
    }

    /// Sends to a link whatever its state. Used to answer a `join` before
    /// the link is admitted.
    async fn send_direct(&self, peer: &PeerId, message: &ControlMessage) {
        let Some(entry) = self.registry.get(peer) else {
            return;
        };
        let result = match self.codec.encode(message) {
            Ok(bytes) => entry.connection().send(&bytes).await.map_err(RoomError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(%peer, kind = message.kind(), error = %e, "send failed");
        }
    }

    /// Sequential best-effort fan-out over open links. Returns how many
    /// peers took the payload.
    async fn broadcast(&self, to: &Recipient, bytes: &[u8], kind: &str) -> usize {
        let mut delivered = 0;
        for peer in self.registry.open_peers() {
            if !to.includes(&peer) {
                continue;
            }
            let Some(entry) = self.registry.get(&peer) else {
                continue;
            };
            match entry.connection().send(bytes).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(%peer, kind, error = %e, "send failed"),
            }
        }
        delivered
    }

    async fn send_app(&mut self, recipient: Recipient, message: AppMessage) -> Result<(), RoomError> {
        if let Recipient::Peer(peer) = &recipient {
            if !self.registry.is_open(peer) {
                return Err(RoomError::UnknownPeer(peer.clone()));
            }
        }
        let bytes = self.codec.encode(&message)?;
        let delivered = self.broadcast(&recipient, &bytes, "app").await;
        tracing::debug!(kind = ?message.kind, delivered, "application message sent");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn on_data(&mut self, from: PeerId, data: Vec<u8>) {
        match Inbound::decode(&self.codec, &data) {
            Inbound::Control(message) => self.on_control(from, message).await,
            message => {
                if !self.registry.is_open(&from) {
                    tracing::debug!(%from, "application traffic before admission, dropping");
                    return;
                }
                self.emit(RoomEvent::Message { from, message });
            }
        }
    }

    async fn on_control(&mut self, from: PeerId, message: ControlMessage) {
        tracing::debug!(%from, kind = message.kind(), "control message");
        if !self.registry.is_open(&from) && !matches!(message, ControlMessage::Join { .. }) {
            tracing::debug!(%from, kind = message.kind(), "ignoring control message before admission");
            return;
        }

        match message {
            ControlMessage::Join { peer_id, profile } => self.on_join(from, peer_id, profile).await,
            ControlMessage::Reject { reason } => {
                tracing::warn!(%from, %reason, "unexpected reject on a live link");
            }
            ControlMessage::PeerList { peers, profiles } => self.merge_peer_list(peers, profiles),
            ControlMessage::NewPeer { peer_id, profile } => self.on_new_peer(peer_id, profile),
            ControlMessage::PeerLeft { peer_id } => self.on_peer_left(from, peer_id).await,
            ControlMessage::UserUpdate { profile } => self.on_user_update(from, profile),
            ControlMessage::Chat { message, timestamp } => self.on_chat(from, message, timestamp),
            ControlMessage::Typing {
                peer_id,
                name,
                is_typing,
                ..
            } => self.on_typing(from, peer_id, name, is_typing),
            ControlMessage::GameStart { first_player, .. } => {
                self.on_game_start(from, first_player).await
            }
            ControlMessage::GameMove {
                row,
                col,
                player_id,
                color,
                timestamp,
            } => {
                self.on_game_move(from, row, col, player_id, color, timestamp)
                    .await
            }
            ControlMessage::GameStateSync { state, .. } => self.on_state_sync(from, state),
            ControlMessage::NextTurn { player_id, .. } => self.on_next_turn(from, player_id).await,
            ControlMessage::SyncRequest => self.on_sync_request(from).await,
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    async fn on_join(&mut self, from: PeerId, claimed: PeerId, profile: Option<UserProfile>) {
        if claimed != from {
            tracing::warn!(%from, %claimed, "join names another identity, using the link's");
        }
        if !self.is_host {
            tracing::info!(%from, "join on a peer address, rejecting as stale");
            self.turn_away(&from, RejectReason::StaleAddress).await;
            return;
        }
        if self.registry.is_open(&from) {
            tracing::debug!(%from, "duplicate join ignored");
            return;
        }

        // Host, every admitted peer, and the joiner.
        let participants = self.registry.open_count() + 2;
        if participants > self.config.max_participants {
            tracing::info!(
                room_id = %self.room_id,
                %from,
                max = self.config.max_participants,
                "room full, rejecting join"
            );
            self.turn_away(&from, RejectReason::RoomFull).await;
            return;
        }

        self.registry.transition(&from, ConnectionState::Open);
        let profile = profile.map(|mut profile| {
            profile.id = from.clone();
            profile.is_host = false;
            profile
        });
        if let Some(profile) = &profile {
            if self.registry.color_taken_by_other(&from, profile.color) {
                tracing::warn!(%from, color = %profile.color, "joiner claims a color already in use");
            }
            self.registry.set_profile(profile.clone());
        }

        let local = self.local_id().clone();
        let peers: Vec<PeerId> = std::iter::once(local)
            .chain(self.registry.open_peers().into_iter().filter(|p| p != &from))
            .collect();
        let profiles: BTreeMap<PeerId, UserProfile> = self
            .registry
            .profiles()
            .iter()
            .filter(|(id, _)| *id != &from)
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();

        self.send_control(
            Recipient::Peer(from.clone()),
            &ControlMessage::PeerList { peers, profiles },
        )
        .await;
        self.send_control(
            Recipient::AllExcept(from.clone()),
            &ControlMessage::NewPeer {
                peer_id: from.clone(),
                profile: profile.clone(),
            },
        )
        .await;

        tracing::info!(
            room_id = %self.room_id,
            peer_id = %from,
            participants,
            "peer admitted"
        );
        self.emit(RoomEvent::PeerJoined {
            peer_id: from,
            profile,
        });
    }

    /// Answers `reject` and drops the link without announcing anything.
    async fn turn_away(&mut self, peer: &PeerId, reason: RejectReason) {
        self.send_direct(peer, &ControlMessage::Reject { reason }).await;
        if let Some(entry) = self.registry.detach(peer) {
            let _ = entry.connection().close().await;
        }
    }

    fn on_new_peer(&mut self, peer_id: PeerId, profile: Option<UserProfile>) {
        if &peer_id == self.local_id() {
            return;
        }
        let profile = profile.filter(|p| p.id == peer_id);
        if let Some(profile) = &profile {
            self.registry.set_profile(profile.clone());
        }
        tracing::info!(room_id = %self.room_id, %peer_id, "peer announced");
        self.dial(peer_id.clone());
        self.emit(RoomEvent::PeerJoined { peer_id, profile });
    }

    async fn on_peer_left(&mut self, from: PeerId, peer_id: PeerId) {
        if &peer_id == self.local_id() {
            return;
        }
        if from == peer_id {
            // The peer is leaving and will close its link next.
            self.depart(&peer_id, true).await;
            return;
        }
        if self.registry.is_open(&peer_id) {
            tracing::debug!(%peer_id, %from, "still linked directly, ignoring peer-left");
            return;
        }

        if let Some(entry) = self.registry.detach(&peer_id) {
            let _ = entry.connection().close().await;
        }
        self.clear_typing(&peer_id);
        if let Some(profile) = self.registry.remove_profile(&peer_id) {
            tracing::info!(room_id = %self.room_id, %peer_id, %from, "peer left (reported)");
            self.emit(RoomEvent::PeerLeft {
                peer_id,
                profile: Some(profile),
            });
        }
    }

    fn on_user_update(&mut self, from: PeerId, mut profile: UserProfile) {
        if profile.id != from {
            tracing::warn!(%from, claimed = %profile.id, "user-update for another peer, dropping");
            return;
        }
        profile.is_host = from == self.host_id();
        if self.registry.color_taken_by_other(&from, profile.color) {
            tracing::warn!(%from, color = %profile.color, "color collision");
        }
        self.registry.set_profile(profile.clone());
        self.emit(RoomEvent::ProfileUpdated { profile });
    }

    async fn set_profile(&mut self, display_name: String, color: Option<PlayerColor>) -> Result<UserProfile, RoomError> {
        let local = self.local_id().clone();
        if let Some(color) = color.filter(|c| self.registry.color_taken_by_other(&local, *c)) {
            return Err(RoomError::ColorTaken(color));
        }

        let requested = color.or(self.registry.local_profile().map(|p| p.color));
        let color = self
            .registry
            .assign_color(&local, requested)
            .ok_or(RoomError::ColorTaken(requested.unwrap_or(PlayerColor::ALL[0])))?;

        let mut profile = UserProfile::new(local, display_name, color);
        profile.is_host = self.is_host;
        self.registry.set_profile(profile.clone());
        self.send_control(
            Recipient::All,
            &ControlMessage::UserUpdate {
                profile: profile.clone(),
            },
        )
        .await;
        self.emit(RoomEvent::ProfileUpdated {
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// Re-announces the local profile to every open link.
    pub(crate) async fn announce_profile(&self) {
        if let Some(profile) = self.registry.local_profile() {
            let message = ControlMessage::UserUpdate {
                profile: profile.clone(),
            };
            self.send_control(Recipient::All, &message).await;
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            local_id: self.local_id().clone(),
            is_host: self.is_host,
            participants: self
                .turn_order()
                .iter()
                .filter_map(|id| self.registry.profile(id).cloned())
                .collect(),
            connected: self.registry.open_peers(),
            game: self.engine.snapshot(),
            available_colors: self.registry.available_colors(),
            chat: self.chat.iter().cloned().collect(),
            typing: self.typing.keys().cloned().collect(),
        }
    }
}
