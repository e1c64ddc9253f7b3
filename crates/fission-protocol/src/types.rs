//! Identity and player-metadata types shared by every layer.
//!
//! Peers are named by the address their transport listener claimed, so a
//! [`PeerId`] is just a string. A room is named by its host's address, so
//! a [`RoomId`] doubles as the host's [`PeerId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The identity of one peer: the address its listener claimed.
///
/// Stable for the lifetime of that listener only. A peer that reconnects
/// normally comes back under a different identity.
///
/// `#[serde(transparent)]` keeps it a plain JSON string, and `Ord` lets it
/// key a `BTreeMap` and break ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wraps an address string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw address string, suitable for `Transport::connect`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The shareable name of a room.
///
/// The host listens under this exact address, which is why
/// [`RoomId::as_peer_id`] exists: joining a room means dialing it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps an existing room identifier (e.g. one pasted from a link).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random room identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity the host of this room answers to.
    pub fn as_peer_id(&self) -> PeerId {
        PeerId(self.0.clone())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// PlayerColor
// ---------------------------------------------------------------------------

/// One of the fixed palette colors a participant can hold.
///
/// Serialized as the hex string browsers render directly, e.g.
/// `"#FF6B6B"`. The palette size also bounds how many participants can
/// have distinct colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerColor {
    #[serde(rename = "#FF6B6B")]
    Coral,
    #[serde(rename = "#4ECDC4")]
    Teal,
    #[serde(rename = "#45B7D1")]
    Sky,
    #[serde(rename = "#96CEB4")]
    Sage,
    #[serde(rename = "#FFEAA7")]
    Sand,
    #[serde(rename = "#DDA0DD")]
    Plum,
}

impl PlayerColor {
    /// The palette, in assignment order.
    pub const ALL: [PlayerColor; 6] = [
        PlayerColor::Coral,
        PlayerColor::Teal,
        PlayerColor::Sky,
        PlayerColor::Sage,
        PlayerColor::Sand,
        PlayerColor::Plum,
    ];

    /// The `#RRGGBB` form used on the wire.
    pub fn as_hex(self) -> &'static str {
        match self {
            PlayerColor::Coral => "#FF6B6B",
            PlayerColor::Teal => "#4ECDC4",
            PlayerColor::Sky => "#45B7D1",
            PlayerColor::Sage => "#96CEB4",
            PlayerColor::Sand => "#FFEAA7",
            PlayerColor::Plum => "#DDA0DD",
        }
    }

    /// A short name for terminal output.
    pub fn name(self) -> &'static str {
        match self {
            PlayerColor::Coral => "coral",
            PlayerColor::Teal => "teal",
            PlayerColor::Sky => "sky",
            PlayerColor::Sage => "sage",
            PlayerColor::Sand => "sand",
            PlayerColor::Plum => "plum",
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_hex())
    }
}

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

/// What a peer shows the rest of the room about itself.
///
/// JSON uses the browser field names: `{"id", "name", "color", "isHost"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: PeerId,
    #[serde(rename = "name")]
    pub display_name: String,
    pub color: PlayerColor,
    #[serde(default)]
    pub is_host: bool,
}

impl UserProfile {
    /// A non-host profile.
    pub fn new(id: PeerId, display_name: impl Into<String>, color: PlayerColor) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            color,
            is_host: false,
        }
    }

    /// Marks the profile as belonging to the room's host.
    pub fn host(mut self) -> Self {
        self.is_host = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Addresses one outbound message inside the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every open link.
    All,

    /// Exactly one peer.
    Peer(PeerId),

    /// Every open link except one. Used to forward a joiner's arrival to
    /// everyone but the joiner.
    AllExcept(PeerId),
}

impl Recipient {
    /// Returns `true` if `peer` should receive a message sent to `self`.
    pub fn includes(&self, peer: &PeerId) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Peer(target) => target == peer,
            Recipient::AllExcept(excluded) => excluded != peer,
        }
    }
}

/// Milliseconds since the Unix epoch, as stamped on outgoing messages.
///
/// Senders stamp; receivers never rewrite the value.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identity types: PeerId, RoomId
    // =====================================================================

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::new("abc-123")).unwrap();
        assert_eq!(json, "\"abc-123\"");
    }

    #[test]
    fn test_peer_id_display_is_raw_address() {
        assert_eq!(PeerId::from("host:9000").to_string(), "host:9000");
    }

    #[test]
    fn test_peer_id_orders_lexicographically() {
        assert!(PeerId::new("a") < PeerId::new("b"));
        assert!(PeerId::new("ab") > PeerId::new("a"));
    }

    #[test]
    fn test_room_id_generate_is_uuid_v4() {
        let room = RoomId::generate();
        let parsed = uuid::Uuid::parse_str(room.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_room_id_generate_is_unique() {
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn test_room_id_as_peer_id_matches_host_identity() {
        let room = RoomId::new("room-7");
        assert_eq!(room.as_peer_id(), PeerId::new("room-7"));
    }

    // =====================================================================
    // PlayerColor
    // =====================================================================

    #[test]
    fn test_player_color_serializes_as_hex() {
        let json = serde_json::to_string(&PlayerColor::Coral).unwrap();
        assert_eq!(json, "\"#FF6B6B\"");
        let color: PlayerColor = serde_json::from_str("\"#DDA0DD\"").unwrap();
        assert_eq!(color, PlayerColor::Plum);
    }

    #[test]
    fn test_player_color_hex_matches_serde_for_whole_palette() {
        for color in PlayerColor::ALL {
            let json = serde_json::to_value(color).unwrap();
            assert_eq!(json, color.as_hex());
        }
    }

    #[test]
    fn test_player_color_unknown_hex_fails_to_decode() {
        let result: Result<PlayerColor, _> = serde_json::from_str("\"#000000\"");
        assert!(result.is_err());
    }

    // =====================================================================
    // UserProfile
    // =====================================================================

    #[test]
    fn test_user_profile_json_uses_browser_field_names() {
        let profile = UserProfile::new(PeerId::new("p1"), "Ada", PlayerColor::Teal).host();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["color"], "#4ECDC4");
        assert_eq!(json["isHost"], true);
    }

    #[test]
    fn test_user_profile_missing_is_host_defaults_to_false() {
        let profile: UserProfile =
            serde_json::from_str(r##"{"id":"p2","name":"Bo","color":"#45B7D1"}"##).unwrap();
        assert!(!profile.is_host);
        assert_eq!(profile.display_name, "Bo");
    }

    // =====================================================================
    // Recipient
    // =====================================================================

    #[test]
    fn test_recipient_includes() {
        let a = PeerId::new("a");
        let b = PeerId::new("b");
        assert!(Recipient::All.includes(&a));
        assert!(Recipient::Peer(a.clone()).includes(&a));
        assert!(!Recipient::Peer(a.clone()).includes(&b));
        assert!(!Recipient::AllExcept(a.clone()).includes(&a));
        assert!(Recipient::AllExcept(a).includes(&b));
    }

    #[test]
    fn test_unix_millis_is_after_2020() {
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
