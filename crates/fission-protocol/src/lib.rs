//! Wire protocol for Fission.
//!
//! This crate defines the "language" that peers speak to each other:
//!
//! - **Identities** ([`PeerId`], [`RoomId`]) and player metadata
//!   ([`UserProfile`], [`PlayerColor`]).
//! - **Messages** ([`ControlMessage`], [`AppMessage`], [`Inbound`]): the
//!   tagged union that travels on every connection.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! coordinator. It doesn't know about connections or rooms. It only knows
//! how to name peers and how to (de)serialize what they say.
//!
//! ```text
//! Transport (bytes) → Protocol (Inbound) → Room coordinator (mesh + game)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{AppMessage, CONTROL_TAG, ChatMessage, ControlMessage, Inbound, RejectReason};
pub use types::{PeerId, PlayerColor, Recipient, RoomId, UserProfile, unix_millis};
