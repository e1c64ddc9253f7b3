//! Getting back into a room after the process or the network dropped out.
//!
//! The manager wraps [`fission_room::host`] and [`fission_room::join`]
//! and keeps a [`SessionStore`] up to date, so that on the next start
//! [`resume`](ReconnectionManager::resume) can put the node back into the
//! room it left, under the same name and color.
//!
//! ```text
//! resume(room) ──▶ load ──▶ none ──────────────▶ Ok(None)
//!                   └──▶ session ──▶ rejoin ──▶ join ──ok──▶ touch + save ──▶ Connected
//!                                                └─err─▶ retryable? ──yes──▶ backoff ──▶ join
//!                                                          └──no / out of attempts ──▶ clear ──▶ Failed
//! ```

use std::time::Duration;

use fission_protocol::{PeerId, PlayerColor, RoomId, unix_millis};
use fission_room::{
    EventReceiver, HostOptions, JoinOptions, ProfileSeed, RoomConfig, RoomError, RoomHandle,
};
use fission_session::{PersistedSession, RetryPolicy, SessionStore};
use fission_transport::Transport;
use tokio::sync::mpsc;

use crate::FissionError;

/// Progress of a join or rejoin, for showing retry status to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectStatus {
    /// Attempt `attempt` of `max_attempts` is under way.
    Attempting { attempt: u32, max_attempts: u32 },

    /// Attempt `attempt` failed; the next one starts after `delay`.
    Backoff { attempt: u32, delay: Duration },

    Connected { room_id: RoomId, peer_id: PeerId },

    /// No further attempts will be made.
    Failed { reason: String },
}

/// Hosts and joins rooms, remembering the last one in a [`SessionStore`].
///
/// Only `ConnectFailed` is retried. A `reject` from the host (room full,
/// stale address) is its answer, and asking again would not change it.
pub struct ReconnectionManager<T: Transport, S: SessionStore> {
    transport: T,
    store: S,
    config: RoomConfig,
    retry: RetryPolicy,
    status: Option<mpsc::UnboundedSender<ReconnectStatus>>,
}

impl<T: Transport, S: SessionStore> ReconnectionManager<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport,
            store,
            config: RoomConfig::default(),
            retry: RetryPolicy::default(),
            status: None,
        }
    }

    pub fn with_room_config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reports progress on a fresh channel, replacing any earlier one.
    pub fn status_updates(&mut self) -> mpsc::UnboundedReceiver<ReconnectStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.status = Some(tx);
        rx
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn report(&self, status: ReconnectStatus) {
        if let Some(tx) = &self.status {
            let _ = tx.send(status);
        }
    }

    /// Hosts `room_id` and remembers it.
    ///
    /// Not retried: the only likely failure is someone else hosting the
    /// room already.
    pub async fn host(
        &self,
        room_id: RoomId,
        profile: ProfileSeed,
    ) -> Result<(RoomHandle, EventReceiver), FissionError> {
        let options = HostOptions {
            profile: Some(profile),
        };
        let (handle, events) =
            fission_room::host(self.transport.clone(), room_id, options, self.config.clone()).await?;
        self.remember(&handle).await?;
        Ok((handle, events))
    }

    /// Joins `room_id` with retries and remembers it.
    pub async fn join(
        &self,
        room_id: RoomId,
        profile: ProfileSeed,
    ) -> Result<(RoomHandle, EventReceiver), FissionError> {
        let options = JoinOptions {
            profile: Some(profile),
            ..JoinOptions::default()
        };
        match self.join_with_retry(&room_id, options).await {
            Ok((handle, events)) => {
                self.remember(&handle).await?;
                Ok((handle, events))
            }
            Err(e) => {
                self.report(ReconnectStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Rejoins `room_id` if a live session for it is stored.
    ///
    /// Returns `Ok(None)` when there is nothing to resume.
    pub async fn resume(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<(RoomHandle, EventReceiver)>, FissionError> {
        let Some(session) = self.store.load(room_id)? else {
            tracing::debug!(%room_id, "no session to resume");
            return Ok(None);
        };
        self.rejoin(session).await.map(Some)
    }

    /// Joins the session's room as the same player.
    ///
    /// Asks for the old identity, re-announces the stored name and color,
    /// and requests the host's board once in. A former host comes back as
    /// an ordinary peer. On terminal failure the stored session is
    /// cleared so the same stale entry is not tried again.
    pub async fn rejoin(
        &self,
        session: PersistedSession,
    ) -> Result<(RoomHandle, EventReceiver), FissionError> {
        tracing::info!(
            room_id = %session.room_id,
            peer_id = %session.peer_id,
            was_host = session.is_host,
            "rejoining room"
        );
        let options = JoinOptions {
            preferred_identity: Some(session.peer_id.clone()),
            profile: Some(ProfileSeed {
                display_name: session.display_name.clone(),
                color: Some(session.color),
            }),
            request_sync: true,
        };

        match self.join_with_retry(&session.room_id, options).await {
            Ok((handle, events)) => {
                let mut session = PersistedSession {
                    peer_id: handle.local_id().clone(),
                    is_host: false,
                    ..session
                };
                session.touch(unix_millis());
                self.store.save(&session)?;
                Ok((handle, events))
            }
            Err(e) => {
                tracing::warn!(room_id = %session.room_id, error = %e, "rejoin failed, forgetting session");
                self.store.clear()?;
                self.report(ReconnectStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Drops the stored session, e.g. after leaving on purpose.
    pub fn forget(&self) -> Result<(), FissionError> {
        self.store.clear()?;
        Ok(())
    }

    async fn join_with_retry(
        &self,
        room_id: &RoomId,
        options: JoinOptions,
    ) -> Result<(RoomHandle, EventReceiver), RoomError> {
        let mut attempt = 1;
        loop {
            self.report(ReconnectStatus::Attempting {
                attempt,
                max_attempts: self.retry.max_attempts(),
            });
            let result = fission_room::join(
                self.transport.clone(),
                room_id.clone(),
                options.clone(),
                self.config.clone(),
            )
            .await;

            match result {
                Ok((handle, events)) => {
                    self.report(ReconnectStatus::Connected {
                        room_id: room_id.clone(),
                        peer_id: handle.local_id().clone(),
                    });
                    return Ok((handle, events));
                }
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(%room_id, attempt, ?delay, error = %e, "join failed, retrying");
                    self.report(ReconnectStatus::Backoff { attempt, delay });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::info!(%room_id, attempt, error = %e, "giving up on join");
                    return Err(e);
                }
            }
        }
    }

    /// Saves what the room knows about this node right now.
    async fn remember(&self, handle: &RoomHandle) -> Result<(), FissionError> {
        let snapshot = handle.snapshot().await?;
        let (display_name, color) = match snapshot.local_profile() {
            Some(profile) => (profile.display_name.clone(), profile.color),
            None => (String::new(), PlayerColor::ALL[0]),
        };
        let session = PersistedSession {
            room_id: handle.room_id().clone(),
            peer_id: handle.local_id().clone(),
            display_name,
            color,
            is_host: handle.is_host(),
            last_connected_at: unix_millis(),
        };
        self.store.save(&session)?;
        Ok(())
    }
}
