//! Where persisted sessions live.
//!
//! Both stores hold a single slot, like a browser keeping one
//! local-storage key: saving a session for a new room replaces the old one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fission_protocol::{RoomId, unix_millis};

use crate::{PersistedSession, SessionConfig, SessionError};

/// The storage key (and file stem) sessions are kept under.
pub const SESSION_KEY: &str = "chain_reaction_session";

/// Stores the last session a node played.
pub trait SessionStore: Send + Sync + 'static {
    /// Replaces whatever was stored.
    fn save(&self, session: &PersistedSession) -> Result<(), SessionError>;

    /// The stored session for `room`, if any.
    ///
    /// Returns `None` when the slot is empty or belongs to another room.
    /// An expired entry is cleared and reported as `None`.
    fn load(&self, room: &RoomId) -> Result<Option<PersistedSession>, SessionError>;

    /// Empties the slot.
    fn clear(&self) -> Result<(), SessionError>;
}

/// Shared by both stores: the room and expiry filter on a loaded slot.
fn usable(
    stored: PersistedSession,
    room: &RoomId,
    config: &SessionConfig,
) -> Result<PersistedSession, Option<PersistedSession>> {
    if &stored.room_id != room {
        return Err(None);
    }
    if stored.is_expired(unix_millis(), config.ttl) {
        return Err(Some(stored));
    }
    Ok(stored)
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// Keeps the session in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<PersistedSession>>>,
    config: SessionConfig,
}

impl MemorySessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            slot: Arc::default(),
            config,
        }
    }

    /// Whatever is in the slot, ignoring room and expiry.
    pub fn peek(&self) -> Option<PersistedSession> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), SessionError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        tracing::debug!(room_id = %session.room_id, "session saved");
        Ok(())
    }

    fn load(&self, room: &RoomId) -> Result<Option<PersistedSession>, SessionError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = slot.clone() else {
            return Ok(None);
        };
        match usable(stored, room, &self.config) {
            Ok(session) => Ok(Some(session)),
            Err(Some(expired)) => {
                tracing::info!(room_id = %expired.room_id, "stored session expired");
                *slot = None;
                Ok(None)
            }
            Err(None) => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// Keeps the session as JSON in `<dir>/chain_reaction_session.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// a crash mid-write leaves either the old session or the new one.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    config: SessionConfig,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>, config: SessionConfig) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_KEY}.json")),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<PersistedSession>, SessionError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // A corrupt slot is as good as an empty one.
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session");
                self.clear()?;
                Ok(None)
            }
        }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(room_id = %session.room_id, path = %self.path.display(), "session saved");
        Ok(())
    }

    fn load(&self, room: &RoomId) -> Result<Option<PersistedSession>, SessionError> {
        let Some(stored) = self.read()? else {
            return Ok(None);
        };
        match usable(stored, room, &self.config) {
            Ok(session) => Ok(Some(session)),
            Err(Some(expired)) => {
                tracing::info!(room_id = %expired.room_id, "stored session expired");
                self.clear()?;
                Ok(None)
            }
            Err(None) => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fission_protocol::{PeerId, PlayerColor};
    use std::time::Duration;

    fn session(room: &str, last_connected_at: u64) -> PersistedSession {
        PersistedSession {
            room_id: RoomId::new(room),
            peer_id: PeerId::new("me"),
            display_name: "Ada".into(),
            color: PlayerColor::Coral,
            is_host: false,
            last_connected_at,
        }
    }

    fn fresh(room: &str) -> PersistedSession {
        session(room, unix_millis())
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("fission-session-{}", uuid::Uuid::new_v4()))
    }

    // =====================================================================
    // MemorySessionStore
    // =====================================================================

    #[test]
    fn test_memory_load_empty_returns_none() {
        let store = MemorySessionStore::default();
        assert_eq!(store.load(&RoomId::new("r")).unwrap(), None);
    }

    #[test]
    fn test_memory_save_then_load_same_room_returns_session() {
        let store = MemorySessionStore::default();
        let saved = fresh("r");
        store.save(&saved).unwrap();
        assert_eq!(store.load(&RoomId::new("r")).unwrap(), Some(saved));
    }

    #[test]
    fn test_memory_load_other_room_returns_none_and_keeps_slot() {
        let store = MemorySessionStore::default();
        store.save(&fresh("r1")).unwrap();

        assert_eq!(store.load(&RoomId::new("r2")).unwrap(), None);
        assert!(store.peek().is_some());
    }

    #[test]
    fn test_memory_load_expired_returns_none_and_clears() {
        let store = MemorySessionStore::new(SessionConfig {
            ttl: Duration::from_secs(60),
        });
        store.save(&session("r", unix_millis() - 61_000)).unwrap();

        assert_eq!(store.load(&RoomId::new("r")).unwrap(), None);
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn test_memory_save_replaces_previous_room() {
        let store = MemorySessionStore::default();
        store.save(&fresh("r1")).unwrap();
        store.save(&fresh("r2")).unwrap();
        assert_eq!(store.load(&RoomId::new("r1")).unwrap(), None);
        assert!(store.load(&RoomId::new("r2")).unwrap().is_some());
    }

    #[test]
    fn test_memory_clones_share_slot() {
        let store = MemorySessionStore::default();
        let other = store.clone();
        store.save(&fresh("r")).unwrap();
        other.clear().unwrap();
        assert_eq!(store.peek(), None);
    }

    // =====================================================================
    // FileSessionStore
    // =====================================================================

    #[test]
    fn test_file_save_then_load_round_trips_through_disk() {
        let dir = temp_dir();
        let store = FileSessionStore::new(&dir, SessionConfig::default());
        let saved = fresh("r");

        store.save(&saved).unwrap();
        assert!(store.path().exists());

        let reopened = FileSessionStore::new(&dir, SessionConfig::default());
        assert_eq!(reopened.load(&RoomId::new("r")).unwrap(), Some(saved));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_load_missing_file_returns_none() {
        let store = FileSessionStore::new(temp_dir(), SessionConfig::default());
        assert_eq!(store.load(&RoomId::new("r")).unwrap(), None);
    }

    #[test]
    fn test_file_load_expired_deletes_file() {
        let dir = temp_dir();
        let store = FileSessionStore::new(
            &dir,
            SessionConfig {
                ttl: Duration::from_secs(1),
            },
        );
        store.save(&session("r", unix_millis() - 5_000)).unwrap();

        assert_eq!(store.load(&RoomId::new("r")).unwrap(), None);
        assert!(!store.path().exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_load_corrupt_file_returns_none_and_deletes_it() {
        let dir = temp_dir();
        let store = FileSessionStore::new(&dir, SessionConfig::default());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), b"{ not json").unwrap();

        assert_eq!(store.load(&RoomId::new("r")).unwrap(), None);
        assert!(!store.path().exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_clear_without_file_is_ok() {
        let store = FileSessionStore::new(temp_dir(), SessionConfig::default());
        assert!(store.clear().is_ok());
    }
}
