//! Messages that travel between peers.
//!
//! Every payload on a connection is one of two things:
//!
//! - a [`ControlMessage`]: protocol traffic the coordinator consumes
//!   itself. Marked by the reserved [`CONTROL_TAG`] field.
//! - anything else: application traffic handed to the embedding app,
//!   either as a structured [`AppMessage`] or as raw bytes.
//!
//! [`Inbound::decode`] makes that split and never fails. A peer that
//! sends garbage only ever produces [`Inbound::Opaque`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Codec, PeerId, PlayerColor, UserProfile};

/// The reserved JSON field that marks a control message.
pub const CONTROL_TAG: &str = "__control";

// ---------------------------------------------------------------------------
// ControlMessage
// ---------------------------------------------------------------------------

/// Why the host turned a joiner away.
///
/// Unknown reason strings from newer peers decode as [`RejectReason::Unknown`]
/// instead of failing the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Admitting the joiner would exceed the room's participant limit.
    RoomFull,
    /// The address answered but is not hosting this room any more.
    StaleAddress,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RejectReason::RoomFull => "room_full",
            RejectReason::StaleAddress => "stale_address",
            RejectReason::Unknown => "unknown",
        })
    }
}

/// One chat line as broadcast by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: PeerId,
    pub sender_name: String,
    pub sender_color: PlayerColor,
    pub content: String,
}

/// Protocol traffic consumed by the room coordinator.
///
/// `#[serde(tag = "__control")]` makes this internally tagged on the
/// reserved field, with kebab-case tags and camelCase fields:
///
/// ```json
/// { "__control": "new-peer", "peerId": "…", "profile": { … } }
/// ```
///
/// Variants that feed the UI or the game (`chat`, `typing`, `game-*`,
/// `next-turn`) carry the sender's `timestamp` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "__control",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ControlMessage {
    // -- Membership --
    /// Joiner → host: "let me in". `peer_id` is the joiner's listening
    /// address, which is how everyone else will dial it.
    Join {
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<UserProfile>,
    },

    /// Host → joiner: admission refused. The host closes right after.
    Reject { reason: RejectReason },

    /// Host → joiner: admission granted. `peers` is the host plus every
    /// peer already in the room, never the joiner itself.
    PeerList {
        peers: Vec<PeerId>,
        #[serde(default)]
        profiles: BTreeMap<PeerId, UserProfile>,
    },

    /// Host → existing peers: somebody was admitted; dial them.
    NewPeer {
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<UserProfile>,
    },

    /// Somebody is gone. Receivers drop the profile unless they still
    /// hold a direct link to that peer.
    PeerLeft { peer_id: PeerId },

    /// A profile changed (name, color), or a mesh dialer introducing
    /// itself on a fresh link.
    UserUpdate { profile: UserProfile },

    // -- Chat --
    Chat { message: ChatMessage, timestamp: u64 },

    Typing {
        peer_id: PeerId,
        name: String,
        is_typing: bool,
        timestamp: u64,
    },

    // -- Game --
    /// Host → all: the game begins with `first_player` to move.
    GameStart { first_player: PeerId, timestamp: u64 },

    /// Mover → all: replay this move on your engine.
    GameMove {
        row: usize,
        col: usize,
        player_id: PeerId,
        color: PlayerColor,
        timestamp: u64,
    },

    /// Host → all (or one): overwrite your game state with `state`.
    ///
    /// The state is opaque here. Only the game engine knows its shape,
    /// the same way the protocol never looks inside application payloads.
    GameStateSync {
        state: serde_json::Value,
        timestamp: u64,
    },

    /// Mover → all: whose turn it is now.
    NextTurn { player_id: PeerId, timestamp: u64 },

    /// Peer → host: please send me a `game-state-sync`.
    SyncRequest,
}

impl ControlMessage {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Join { .. } => "join",
            ControlMessage::Reject { .. } => "reject",
            ControlMessage::PeerList { .. } => "peer-list",
            ControlMessage::NewPeer { .. } => "new-peer",
            ControlMessage::PeerLeft { .. } => "peer-left",
            ControlMessage::UserUpdate { .. } => "user-update",
            ControlMessage::Chat { .. } => "chat",
            ControlMessage::Typing { .. } => "typing",
            ControlMessage::GameStart { .. } => "game-start",
            ControlMessage::GameMove { .. } => "game-move",
            ControlMessage::GameStateSync { .. } => "game-state-sync",
            ControlMessage::NextTurn { .. } => "next-turn",
            ControlMessage::SyncRequest => "sync-request",
        }
    }
}

// ---------------------------------------------------------------------------
// AppMessage
// ---------------------------------------------------------------------------

/// Application traffic: `{ "type": …, "payload": …, "timestamp": … }`.
///
/// Every field is lenient on decode so any JSON object without the
/// reserved tag lands here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub timestamp: u64,
}

impl AppMessage {
    /// Builds a message stamped with the current time.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: Some(kind.into()),
            payload,
            timestamp: crate::unix_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound: the decoded form of anything a peer sent
// ---------------------------------------------------------------------------

/// A decoded payload from one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Protocol traffic for the coordinator.
    Control(ControlMessage),
    /// A structured application message.
    App(AppMessage),
    /// Bytes nobody could make sense of, passed through untouched.
    Opaque(Vec<u8>),
}

impl Inbound {
    /// Classifies `data`. Never fails: availability over strictness.
    ///
    /// A payload that carries the reserved tag but doesn't parse as a
    /// control message is treated as [`Inbound::Opaque`], never as
    /// application data, so a malformed protocol message can't
    /// masquerade as app traffic.
    pub fn decode<C: Codec>(codec: &C, data: &[u8]) -> Inbound {
        let object = match codec.decode::<serde_json::Map<String, serde_json::Value>>(data) {
            Ok(object) => object,
            Err(e) => {
                tracing::debug!(error = %e, len = data.len(), "payload is not a JSON object");
                return Inbound::Opaque(data.to_vec());
            }
        };

        if object.contains_key(CONTROL_TAG) {
            return match serde_json::from_value(serde_json::Value::Object(object)) {
                Ok(msg) => Inbound::Control(msg),
                Err(e) => {
                    tracing::debug!(error = %e, "malformed control message");
                    Inbound::Opaque(data.to_vec())
                }
            };
        }

        match serde_json::from_value(serde_json::Value::Object(object)) {
            Ok(msg) => Inbound::App(msg),
            Err(e) => {
                tracing::debug!(error = %e, "malformed application message");
                Inbound::Opaque(data.to_vec())
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser peers parse these exact JSON shapes, so most tests
    //! assert field names rather than round trips.

    use super::*;
    use crate::JsonCodec;
    use serde_json::json;

    fn profile(id: &str, name: &str, color: PlayerColor) -> UserProfile {
        UserProfile::new(PeerId::new(id), name, color)
    }

    // =====================================================================
    // ControlMessage: JSON shape per variant
    // =====================================================================

    #[test]
    fn test_join_json_format() {
        let msg = ControlMessage::Join {
            peer_id: PeerId::new("joiner"),
            profile: Some(profile("joiner", "Ada", PlayerColor::Sky)),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["__control"], "join");
        assert_eq!(json["peerId"], "joiner");
        assert_eq!(json["profile"]["name"], "Ada");
    }

    #[test]
    fn test_join_without_profile_omits_field() {
        let msg = ControlMessage::Join {
            peer_id: PeerId::new("joiner"),
            profile: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("profile").is_none());

        let decoded: ControlMessage =
            serde_json::from_str(r#"{"__control":"join","peerId":"joiner"}"#).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_reject_json_format() {
        let msg = ControlMessage::Reject {
            reason: RejectReason::RoomFull,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"__control": "reject", "reason": "room_full"})
        );
    }

    #[test]
    fn test_reject_unknown_reason_decodes_as_unknown() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"__control":"reject","reason":"banned"}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Reject {
                reason: RejectReason::Unknown
            }
        );
    }

    #[test]
    fn test_peer_list_json_format() {
        let mut profiles = BTreeMap::new();
        profiles.insert(PeerId::new("host"), profile("host", "H", PlayerColor::Coral).host());
        let msg = ControlMessage::PeerList {
            peers: vec![PeerId::new("host"), PeerId::new("p2")],
            profiles,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["__control"], "peer-list");
        assert_eq!(json["peers"], json!(["host", "p2"]));
        assert_eq!(json["profiles"]["host"]["isHost"], true);
    }

    #[test]
    fn test_new_peer_and_peer_left_json_format() {
        let json = serde_json::to_value(ControlMessage::NewPeer {
            peer_id: PeerId::new("p3"),
            profile: None,
        })
        .unwrap();
        assert_eq!(json, json!({"__control": "new-peer", "peerId": "p3"}));

        let json = serde_json::to_value(ControlMessage::PeerLeft {
            peer_id: PeerId::new("p3"),
        })
        .unwrap();
        assert_eq!(json, json!({"__control": "peer-left", "peerId": "p3"}));
    }

    #[test]
    fn test_typing_json_format() {
        let msg = ControlMessage::Typing {
            peer_id: PeerId::new("p1"),
            name: "Ada".into(),
            is_typing: true,
            timestamp: 42,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["__control"], "typing");
        assert_eq!(json["isTyping"], true);
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn test_chat_json_format() {
        let msg = ControlMessage::Chat {
            message: ChatMessage {
                sender_id: PeerId::new("p1"),
                sender_name: "Ada".into(),
                sender_color: PlayerColor::Sage,
                content: "hi".into(),
            },
            timestamp: 7,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["message"]["senderId"], "p1");
        assert_eq!(json["message"]["senderColor"], "#96CEB4");
        assert_eq!(json["message"]["content"], "hi");
    }

    #[test]
    fn test_game_move_json_format() {
        let msg = ControlMessage::GameMove {
            row: 2,
            col: 3,
            player_id: PeerId::new("p1"),
            color: PlayerColor::Sand,
            timestamp: 1000,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "__control": "game-move",
                "row": 2,
                "col": 3,
                "playerId": "p1",
                "color": "#FFEAA7",
                "timestamp": 1000
            })
        );
    }

    #[test]
    fn test_game_start_next_turn_and_sync_json_format() {
        let json = serde_json::to_value(ControlMessage::GameStart {
            first_player: PeerId::new("p2"),
            timestamp: 1,
        })
        .unwrap();
        assert_eq!(json["__control"], "game-start");
        assert_eq!(json["firstPlayer"], "p2");

        let json = serde_json::to_value(ControlMessage::NextTurn {
            player_id: PeerId::new("p2"),
            timestamp: 1,
        })
        .unwrap();
        assert_eq!(json["__control"], "next-turn");
        assert_eq!(json["playerId"], "p2");

        let json = serde_json::to_value(ControlMessage::GameStateSync {
            state: json!({"status": "waiting"}),
            timestamp: 1,
        })
        .unwrap();
        assert_eq!(json["__control"], "game-state-sync");
        assert_eq!(json["state"]["status"], "waiting");

        let json = serde_json::to_value(ControlMessage::SyncRequest).unwrap();
        assert_eq!(json, json!({"__control": "sync-request"}));
    }

    #[test]
    fn test_control_message_kind_matches_wire_tag() {
        let msgs = [
            ControlMessage::SyncRequest,
            ControlMessage::PeerLeft {
                peer_id: PeerId::new("x"),
            },
            ControlMessage::Reject {
                reason: RejectReason::StaleAddress,
            },
        ];
        for msg in msgs {
            let json = serde_json::to_value(&msg).unwrap();
            assert_eq!(json[CONTROL_TAG], msg.kind());
        }
    }

    // =====================================================================
    // Inbound::decode
    // =====================================================================

    #[test]
    fn test_decode_control_message() {
        let data = br#"{"__control":"peer-left","peerId":"p9"}"#;
        assert_eq!(
            Inbound::decode(&JsonCodec, data),
            Inbound::Control(ControlMessage::PeerLeft {
                peer_id: PeerId::new("p9")
            })
        );
    }

    #[test]
    fn test_decode_app_message() {
        let data = br#"{"type":"emote","payload":{"face":":)"},"timestamp":5}"#;
        match Inbound::decode(&JsonCodec, data) {
            Inbound::App(msg) => {
                assert_eq!(msg.kind.as_deref(), Some("emote"));
                assert_eq!(msg.payload["face"], ":)");
                assert_eq!(msg.timestamp, 5);
            }
            other => panic!("expected app message, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_object_without_type_is_app_message() {
        match Inbound::decode(&JsonCodec, br#"{"anything":1}"#) {
            Inbound::App(msg) => {
                assert_eq!(msg.kind, None);
                assert!(msg.payload.is_null());
            }
            other => panic!("expected app message, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_non_json_is_opaque() {
        assert_eq!(
            Inbound::decode(&JsonCodec, b"\x00\x01binary"),
            Inbound::Opaque(b"\x00\x01binary".to_vec())
        );
    }

    #[test]
    fn test_decode_json_array_is_opaque() {
        assert_eq!(
            Inbound::decode(&JsonCodec, b"[1,2,3]"),
            Inbound::Opaque(b"[1,2,3]".to_vec())
        );
    }

    #[test]
    fn test_decode_malformed_control_message_is_opaque_not_app() {
        let data = br#"{"__control":"game-move","row":"nope"}"#;
        assert_eq!(Inbound::decode(&JsonCodec, data), Inbound::Opaque(data.to_vec()));
    }

    #[test]
    fn test_decode_unknown_control_tag_is_opaque() {
        let data = br#"{"__control":"teleport"}"#;
        assert_eq!(Inbound::decode(&JsonCodec, data), Inbound::Opaque(data.to_vec()));
    }

    #[test]
    fn test_app_message_new_stamps_time() {
        let msg = AppMessage::new("ping", json!(null));
        assert_eq!(msg.kind.as_deref(), Some("ping"));
        assert!(msg.timestamp > 0);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ping");
    }
}
