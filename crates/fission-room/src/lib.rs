//! Room coordination for Fission peers.
//!
//! One node hosts a room under the room id; everyone else joins through
//! it and then dials the rest of the room directly, so the room converges
//! to a full mesh. Each hosted or joined room runs as an isolated Tokio
//! task (actor model) that owns the room's links, profiles, chat, and
//! game engine.
//!
//! # Key types
//!
//! - [`host`] / [`join`]: enter a room
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomEvent`]: what the actor reports back
//! - [`ConnectionRegistry`]: links and profiles known to one node
//! - [`RoomConfig`]: participant limit, timeouts, board size

mod config;
mod connect;
mod error;
mod event;
mod handle;
mod registry;
mod room;

pub use config::{ConnectionState, RoomConfig};
pub use connect::{host, join};
pub use error::RoomError;
pub use event::{ChatEntry, EventReceiver, RoomEvent, RoomSnapshot};
pub use handle::{HostOptions, JoinOptions, ProfileSeed, RoomHandle};
pub use registry::{ConnectionEntry, ConnectionRegistry};
