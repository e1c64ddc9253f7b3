//! Entry points: host a room, or join one through its host.

use std::collections::BTreeMap;
use std::time::Duration;

use fission_protocol::{
    Codec, ControlMessage, Inbound, JsonCodec, PeerId, PlayerColor, Recipient, RoomId, UserProfile,
};
use fission_transport::{Connection, Listener, Transport, TransportError};

use crate::room::RoomActor;
use crate::{
    ConnectionRegistry, ConnectionState, EventReceiver, HostOptions, JoinOptions, RoomConfig,
    RoomError, RoomHandle,
};

/// Hosts `room_id`: claims it as this node's address and starts admitting
/// joiners.
///
/// # Errors
/// [`RoomError::AddressInUse`] when another node already hosts `room_id`.
pub async fn host<T: Transport>(
    transport: T,
    room_id: RoomId,
    options: HostOptions,
    config: RoomConfig,
) -> Result<(RoomHandle, EventReceiver), RoomError> {
    let listener = transport
        .listen(Some(room_id.as_str()))
        .await
        .map_err(|e| match e {
            TransportError::AddressInUse(_) => RoomError::AddressInUse(room_id.clone()),
            other => RoomError::Transport(other),
        })?;

    let local_id = room_id.as_peer_id();
    let mut registry = ConnectionRegistry::new(local_id.clone());
    if let Some(seed) = options.profile {
        let color = seed.color.unwrap_or(PlayerColor::ALL[0]);
        registry.set_profile(UserProfile::new(local_id, seed.display_name, color).host());
    }

    let (mut actor, handle, events) = RoomActor::new(transport, room_id.clone(), true, config, registry);
    actor.spawn_accept_loop(listener);
    tokio::spawn(actor.run());

    tracing::info!(%room_id, "room hosted");
    Ok((handle, events))
}

/// Joins `room_id` through its host.
///
/// ```text
/// listen ──▶ connect host ──▶ join ──▶ peer-list ──▶ dial listed peers
///                                  └─▶ reject    ──▶ Rejected
/// ```
///
/// Connecting and waiting for the answer are each bounded by
/// `config.join_timeout`.
///
/// # Errors
/// - [`RoomError::ConnectFailed`] when the host does not answer in time.
/// - [`RoomError::Rejected`] when the host answers `reject`.
pub async fn join<T: Transport>(
    transport: T,
    room_id: RoomId,
    options: JoinOptions,
    config: RoomConfig,
) -> Result<(RoomHandle, EventReceiver), RoomError> {
    let host_id = room_id.as_peer_id();
    // The room address belongs to whoever hosts it, never to a joiner.
    let preferred = options.preferred_identity.as_ref().filter(|id| **id != host_id);
    let listener = claim_identity(&transport, preferred).await?;
    let local_id = PeerId::new(listener.local_address());
    let codec = JsonCodec;

    let requested = options.profile.map(|seed| {
        let color = seed.color.unwrap_or(PlayerColor::ALL[0]);
        UserProfile::new(local_id.clone(), seed.display_name, color)
    });

    let conn = connect_host(&transport, &local_id, &host_id, config.join_timeout).await?;
    let join = ControlMessage::Join {
        peer_id: local_id.clone(),
        profile: requested.clone(),
    };
    if let Err(e) = conn.send(&codec.encode(&join)?).await {
        return Err(connect_failed(&host_id, e));
    }
    let (peers, profiles) = await_admission(&conn, &codec, &host_id, config.join_timeout).await?;
    tracing::info!(%room_id, %local_id, peers = peers.len(), "joined room");

    let mut registry = ConnectionRegistry::new(local_id.clone());
    let mut recolored = false;
    for profile in profiles.values() {
        if profile.id != local_id {
            registry.set_profile(profile.clone());
        }
    }
    if let Some(mut profile) = requested {
        match registry.assign_color(&local_id, Some(profile.color)) {
            Some(color) if color != profile.color => {
                tracing::warn!(taken = %profile.color, %color, "color already in use, switching");
                profile.color = color;
                recolored = true;
            }
            Some(_) => {}
            None => tracing::warn!(color = %profile.color, "palette exhausted, sharing a color"),
        }
        registry.set_profile(profile);
    }

    let request_sync = options.request_sync;
    let (mut actor, handle, events) = RoomActor::new(transport, room_id, false, config, registry);
    actor.spawn_accept_loop(listener);
    actor
        .adopt(host_id.clone(), conn, ConnectionState::Open, local_id)
        .await;
    actor.merge_peer_list(peers, BTreeMap::new());
    if recolored {
        actor.announce_profile().await;
    }
    if request_sync {
        actor
            .send_control(Recipient::Peer(host_id), &ControlMessage::SyncRequest)
            .await;
    }
    tokio::spawn(actor.run());

    Ok((handle, events))
}

/// Listens under `preferred` when it is free, otherwise under a fresh
/// transport-assigned identity.
async fn claim_identity<T: Transport>(transport: &T, preferred: Option<&PeerId>) -> Result<T::Listener, RoomError> {
    let Some(preferred) = preferred else {
        return Ok(transport.listen(None).await?);
    };
    match transport.listen(Some(preferred.as_str())).await {
        Ok(listener) => Ok(listener),
        Err(TransportError::AddressInUse(address)) => {
            tracing::warn!(%address, "preferred identity taken, using a fresh one");
            Ok(transport.listen(None).await?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn connect_host<T: Transport>(
    transport: &T,
    local: &PeerId,
    host: &PeerId,
    timeout: Duration,
) -> Result<T::Connection, RoomError> {
    match tokio::time::timeout(timeout, transport.connect(local.as_str(), host.as_str())).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(connect_failed(host, e)),
        Err(_) => Err(connect_failed(host, "timed out")),
    }
}

/// Reads the host's answer to `join`. Anything else that arrives first is
/// skipped.
async fn await_admission<C: Connection>(
    conn: &C,
    codec: &JsonCodec,
    host: &PeerId,
    timeout: Duration,
) -> Result<(Vec<PeerId>, BTreeMap<PeerId, UserProfile>), RoomError> {
    let handshake = async {
        loop {
            let data = match conn.recv().await {
                Ok(Some(data)) => data,
                Ok(None) => return Err(connect_failed(host, "closed before answering")),
                Err(e) => return Err(connect_failed(host, e)),
            };
            match Inbound::decode(codec, &data) {
                Inbound::Control(ControlMessage::PeerList { peers, profiles }) => {
                    return Ok((peers, profiles));
                }
                Inbound::Control(ControlMessage::Reject { reason }) => {
                    tracing::info!(%host, %reason, "join rejected");
                    let _ = conn.close().await;
                    return Err(RoomError::Rejected { reason });
                }
                _ => tracing::debug!(%host, "skipping message before admission"),
            }
        }
    };
    match tokio::time::timeout(timeout, handshake).await {
        Ok(result) => result,
        Err(_) => {
            let _ = conn.close().await;
            Err(connect_failed(host, "timed out waiting for an answer"))
        }
    }
}

fn connect_failed(host: &PeerId, reason: impl ToString) -> RoomError {
    RoomError::ConnectFailed {
        address: host.to_string(),
        reason: reason.to_string(),
    }
}
