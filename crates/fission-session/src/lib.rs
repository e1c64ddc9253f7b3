//! Session persistence for Fission.
//!
//! A peer that drops out of a room (closed laptop, crashed process,
//! flaky network) should be able to come back as the same player. This
//! crate holds what that takes:
//!
//! 1. **What to remember**: [`PersistedSession`], the last room and
//!    profile this node played under.
//! 2. **Where to keep it**: the [`SessionStore`] trait, with an in-memory
//!    store and a JSON-file store. One slot, expiring after
//!    [`SessionConfig::ttl`].
//! 3. **How hard to try**: [`RetryPolicy`], exponential backoff for the
//!    rejoin loop.
//!
//! # How it fits in the stack
//!
//! ```text
//! Reconnection manager (fission)  ← reads/writes sessions, sleeps per RetryPolicy
//!     ↕
//! Session layer (this crate)      ← remembers the last room
//!     ↕
//! Protocol layer (below)          ← RoomId, PeerId, PlayerColor
//! ```

mod error;
mod session;
mod store;

pub use error::SessionError;
pub use session::{PersistedSession, RetryPolicy, SessionConfig};
pub use store::{FileSessionStore, MemorySessionStore, SESSION_KEY, SessionStore};
