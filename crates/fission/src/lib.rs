//! # Fission
//!
//! Peer-to-peer rooms for small multiplayer board games, with Chain
//! Reaction built in.
//!
//! One node hosts a room under the room id; everyone else joins through
//! it and then links directly to every other participant. There is no
//! server: the host admits joiners and holds the authoritative board,
//! and every peer replays the same moves on the same deterministic
//! engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fission::prelude::*;
//!
//! # async fn run() -> Result<(), FissionError> {
//! let net = MemoryNetwork::new();
//! let (host, _events) = PeerBuilder::new(net.clone())
//!     .display_name("Hana")
//!     .host(RoomId::new("lobby"))
//!     .await?;
//! let (guest, _events) = PeerBuilder::new(net)
//!     .display_name("Ada")
//!     .join(RoomId::new("lobby"))
//!     .await?;
//!
//! host.start_game(Some(host.local_id().clone())).await?;
//! host.submit_move(0, 0).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod reconnect;

pub use builder::PeerBuilder;
pub use error::FissionError;
pub use reconnect::{ReconnectStatus, ReconnectionManager};

pub use fission_engine as engine;
pub use fission_protocol as protocol;
pub use fission_room as room;
pub use fission_session as session;
pub use fission_transport as transport;

/// Installs a `tracing` subscriber for binaries and tests.
///
/// Honours `RUST_LOG`; defaults to `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    pub use crate::{FissionError, PeerBuilder, ReconnectStatus, ReconnectionManager};
    pub use fission_engine::{GameState, GameStatus, MoveError, MoveOutcome};
    pub use fission_protocol::{Inbound, PeerId, PlayerColor, RoomId, UserProfile};
    pub use fission_room::{
        EventReceiver, RoomConfig, RoomError, RoomEvent, RoomHandle, RoomSnapshot,
    };
    pub use fission_session::{
        FileSessionStore, MemorySessionStore, PersistedSession, RetryPolicy, SessionConfig,
        SessionStore,
    };
    pub use fission_transport::{MemoryNetwork, Transport};
}
