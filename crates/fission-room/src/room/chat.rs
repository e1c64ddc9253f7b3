//! Chat history and typing indicators.

use fission_protocol::{ChatMessage, ControlMessage, PeerId, Recipient, unix_millis};
use fission_transport::Transport;
use tokio::task::AbortHandle;

use super::{NetEvent, RoomActor};
use crate::{ChatEntry, RoomError, RoomEvent};

/// A peer shown as typing, until `expiry` fires or something newer arrives.
pub(super) struct TypingIndicator {
    name: String,
    generation: u64,
    expiry: AbortHandle,
}

impl<T: Transport> RoomActor<T> {
    pub(super) async fn send_chat(&mut self, content: String) -> Result<Option<ChatMessage>, RoomError> {
        let profile = self
            .registry
            .local_profile()
            .cloned()
            .ok_or(RoomError::ProfileMissing)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let message = ChatMessage {
            sender_id: profile.id.clone(),
            sender_name: profile.display_name.clone(),
            sender_color: profile.color,
            content: content.to_string(),
        };
        let timestamp = unix_millis();
        self.send_control(
            Recipient::All,
            &ControlMessage::Chat {
                message: message.clone(),
                timestamp,
            },
        )
        .await;
        // Sending ends typing.
        self.send_control(
            Recipient::All,
            &ControlMessage::Typing {
                peer_id: profile.id,
                name: profile.display_name,
                is_typing: false,
                timestamp,
            },
        )
        .await;
        self.record_chat(message.clone(), timestamp);
        Ok(Some(message))
    }

    pub(super) async fn set_typing(&mut self, is_typing: bool) {
        let Some(profile) = self.registry.local_profile() else {
            tracing::debug!("no local profile, typing indicator not sent");
            return;
        };
        let message = ControlMessage::Typing {
            peer_id: profile.id.clone(),
            name: profile.display_name.clone(),
            is_typing,
            timestamp: unix_millis(),
        };
        self.send_control(Recipient::All, &message).await;
    }

    fn record_chat(&mut self, message: ChatMessage, timestamp: u64) {
        while self.chat.len() >= self.config.chat_history.max(1) {
            self.chat.pop_front();
        }
        self.chat.push_back(ChatEntry {
            message: message.clone(),
            timestamp,
        });
        self.emit(RoomEvent::Chat { message, timestamp });
    }

    pub(super) fn on_chat(&mut self, from: PeerId, message: ChatMessage, timestamp: u64) {
        if message.sender_id != from {
            tracing::warn!(%from, sender = %message.sender_id, "chat for another sender, dropping");
            return;
        }
        self.clear_typing(&from);
        self.record_chat(message, timestamp);
    }

    pub(super) fn on_typing(&mut self, from: PeerId, peer_id: PeerId, name: String, is_typing: bool) {
        if peer_id != from {
            tracing::warn!(%from, %peer_id, "typing for another peer, dropping");
            return;
        }
        if !is_typing {
            self.clear_typing(&from);
            return;
        }

        self.typing_generation += 1;
        let generation = self.typing_generation;
        let net_tx = self.net_tx.clone();
        let timeout = self.config.typing_timeout;
        let peer = from.clone();
        let expiry = self.tasks.spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = net_tx.send(NetEvent::TypingExpired { peer, generation });
        });

        let indicator = TypingIndicator {
            name: name.clone(),
            generation,
            expiry,
        };
        match self.typing.insert(from.clone(), indicator) {
            Some(previous) => previous.expiry.abort(),
            None => self.emit(RoomEvent::Typing {
                peer_id: from,
                name,
                is_typing: true,
            }),
        }
    }

    pub(super) fn on_typing_expired(&mut self, peer: &PeerId, generation: u64) {
        if self
            .typing
            .get(peer)
            .is_some_and(|indicator| indicator.generation == generation)
        {
            self.clear_typing(peer);
        }
    }

    /// Drops `peer`'s indicator and cancels its expiry.
    pub(super) fn clear_typing(&mut self, peer: &PeerId) {
        if let Some(indicator) = self.typing.remove(peer) {
            indicator.expiry.abort();
            self.emit(RoomEvent::Typing {
                peer_id: peer.clone(),
                name: indicator.name,
                is_typing: false,
            });
        }
    }
}
