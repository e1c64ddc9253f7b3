//! The connection registry: every link this node holds, plus every
//! profile it knows.
//!
//! Owned by the room actor and mutated only from its task, so nothing
//! here locks. Profiles outlive links on purpose: a peer we only know
//! through the host has a profile but no entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use fission_protocol::{PeerId, PlayerColor, UserProfile};
use fission_transport::{Connection, ConnectionId};
use tokio::task::AbortHandle;

use crate::ConnectionState;

/// One link to one peer.
pub struct ConnectionEntry<C> {
    peer_id: PeerId,
    conn: Arc<C>,
    state: ConnectionState,
    /// Which side opened the link. Used to settle duplicate links.
    dialed_by: PeerId,
    reader: Option<AbortHandle>,
}

impl<C: Connection> ConnectionEntry<C> {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn dialed_by(&self) -> &PeerId {
        &self.dialed_by
    }
}

impl<C> Drop for ConnectionEntry<C> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Links and profiles known to one node.
pub struct ConnectionRegistry<C> {
    local_id: PeerId,
    entries: BTreeMap<PeerId, ConnectionEntry<C>>,
    profiles: BTreeMap<PeerId, UserProfile>,
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            entries: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    // -- Links --

    /// Adds a link, returning the entry it replaced (if any). The caller
    /// closes the replaced connection.
    pub fn insert(
        &mut self,
        peer_id: PeerId,
        conn: Arc<C>,
        state: ConnectionState,
        dialed_by: PeerId,
    ) -> Option<ConnectionEntry<C>> {
        let entry = ConnectionEntry {
            peer_id: peer_id.clone(),
            conn,
            state,
            dialed_by,
            reader: None,
        };
        self.entries.insert(peer_id, entry)
    }

    /// Attaches the task reading `peer`'s link so removal can stop it.
    pub fn set_reader(&mut self, peer_id: &PeerId, reader: AbortHandle) {
        match self.entries.get_mut(peer_id) {
            Some(entry) => entry.reader = Some(reader),
            None => reader.abort(),
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&ConnectionEntry<C>> {
        self.entries.get(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.entries.contains_key(peer_id)
    }

    /// Returns `true` if `peer_id`'s current link is `conn_id`. Events
    /// from any other connection are stale.
    pub fn is_current(&self, peer_id: &PeerId, conn_id: ConnectionId) -> bool {
        self.entries
            .get(peer_id)
            .is_some_and(|entry| entry.connection_id() == conn_id)
    }

    pub fn is_open(&self, peer_id: &PeerId) -> bool {
        self.entries
            .get(peer_id)
            .is_some_and(|entry| entry.state.is_open())
    }

    /// Moves `peer_id`'s link to `target` if the state machine allows it.
    pub fn transition(&mut self, peer_id: &PeerId, target: ConnectionState) -> bool {
        match self.entries.get_mut(peer_id) {
            Some(entry) if entry.state.can_transition_to(target) => {
                entry.state = target;
                true
            }
            _ => false,
        }
    }

    /// Removes the link and the peer's profile. The link is marked closed.
    pub fn remove(&mut self, peer_id: &PeerId) -> Option<(ConnectionEntry<C>, Option<UserProfile>)> {
        let mut entry = self.entries.remove(peer_id)?;
        entry.state = ConnectionState::Closed;
        let profile = self.profiles.remove(peer_id);
        Some((entry, profile))
    }

    /// Removes the link only, keeping the profile.
    pub fn detach(&mut self, peer_id: &PeerId) -> Option<ConnectionEntry<C>> {
        let mut entry = self.entries.remove(peer_id)?;
        entry.state = ConnectionState::Closed;
        Some(entry)
    }

    /// Drops everything, returning the links so the caller can close them.
    pub fn drain(&mut self) -> Vec<ConnectionEntry<C>> {
        self.profiles.retain(|id, _| id == &self.local_id);
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Open links, in peer id order.
    pub fn open_peers(&self) -> Vec<PeerId> {
        self.entries
            .values()
            .filter(|entry| entry.state.is_open())
            .map(|entry| entry.peer_id.clone())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.entries.values().filter(|e| e.state.is_open()).count()
    }

    /// All links, whatever their state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -- Profiles --

    /// Stores a profile, returning the previous one for that peer.
    pub fn set_profile(&mut self, profile: UserProfile) -> Option<UserProfile> {
        self.profiles.insert(profile.id.clone(), profile)
    }

    pub fn profile(&self, peer_id: &PeerId) -> Option<&UserProfile> {
        self.profiles.get(peer_id)
    }

    pub fn local_profile(&self) -> Option<&UserProfile> {
        self.profiles.get(&self.local_id)
    }

    pub fn remove_profile(&mut self, peer_id: &PeerId) -> Option<UserProfile> {
        self.profiles.remove(peer_id)
    }

    pub fn profiles(&self) -> &BTreeMap<PeerId, UserProfile> {
        &self.profiles
    }

    /// Palette colors no live profile holds.
    pub fn available_colors(&self) -> Vec<PlayerColor> {
        PlayerColor::ALL
            .into_iter()
            .filter(|color| !self.profiles.values().any(|p| p.color == *color))
            .collect()
    }

    /// Returns `true` if someone other than `peer_id` holds `color`.
    pub fn color_taken_by_other(&self, peer_id: &PeerId, color: PlayerColor) -> bool {
        self.profiles
            .values()
            .any(|p| &p.id != peer_id && p.color == color)
    }

    /// A color for `peer_id`: `preferred` when nobody else holds it,
    /// otherwise the first free palette color. `None` when the palette is
    /// used up.
    pub fn assign_color(&self, peer_id: &PeerId, preferred: Option<PlayerColor>) -> Option<PlayerColor> {
        if let Some(color) = preferred.filter(|c| !self.color_taken_by_other(peer_id, *c)) {
            return Some(color);
        }
        PlayerColor::ALL
            .into_iter()
            .find(|color| !self.color_taken_by_other(peer_id, *color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fission_transport::{Listener, MemoryConnection, MemoryListener, MemoryNetwork, Transport};

    fn p(id: &str) -> PeerId {
        PeerId::new(id)
    }

    fn profile(id: &str, color: PlayerColor) -> UserProfile {
        UserProfile::new(p(id), id.to_uppercase(), color)
    }

    async fn link(net: &MemoryNetwork, listener: &mut MemoryListener, from: &str) -> Arc<MemoryConnection> {
        let _dialer = net.connect(from, listener.local_address()).await.unwrap();
        Arc::new(listener.accept().await.unwrap())
    }

    // =====================================================================
    // Links
    // =====================================================================

    #[tokio::test]
    async fn test_insert_and_transition_to_open() {
        let net = MemoryNetwork::new();
        let mut listener = net.listen(Some("host")).await.unwrap();
        let mut registry = ConnectionRegistry::new(p("host"));

        let conn = link(&net, &mut listener, "a").await;
        registry.insert(p("a"), conn, ConnectionState::Connecting, p("a"));

        assert!(registry.contains(&p("a")));
        assert!(!registry.is_open(&p("a")));
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.len(), 1);

        assert!(registry.transition(&p("a"), ConnectionState::Open));
        assert!(registry.is_open(&p("a")));
        assert!(!registry.transition(&p("a"), ConnectionState::Connecting));
        assert_eq!(registry.open_peers(), vec![p("a")]);
    }

    #[tokio::test]
    async fn test_insert_returns_replaced_entry_and_is_current_tracks_newest() {
        let net = MemoryNetwork::new();
        let mut listener = net.listen(Some("host")).await.unwrap();
        let mut registry = ConnectionRegistry::new(p("host"));

        let first = link(&net, &mut listener, "a").await;
        let first_id = first.id();
        registry.insert(p("a"), first, ConnectionState::Open, p("a"));
        let second = link(&net, &mut listener, "a").await;
        let second_id = second.id();

        let replaced = registry.insert(p("a"), second, ConnectionState::Open, p("host"));

        assert_eq!(replaced.unwrap().connection_id(), first_id);
        assert!(registry.is_current(&p("a"), second_id));
        assert!(!registry.is_current(&p("a"), first_id));
        assert_eq!(registry.get(&p("a")).unwrap().dialed_by(), &p("host"));
    }

    #[tokio::test]
    async fn test_remove_drops_profile_and_frees_color() {
        let net = MemoryNetwork::new();
        let mut listener = net.listen(Some("host")).await.unwrap();
        let mut registry = ConnectionRegistry::new(p("host"));
        registry.set_profile(profile("host", PlayerColor::Coral).host());
        let conn = link(&net, &mut listener, "a").await;
        registry.insert(p("a"), conn, ConnectionState::Open, p("a"));
        registry.set_profile(profile("a", PlayerColor::Teal));
        assert!(!registry.available_colors().contains(&PlayerColor::Teal));

        let (entry, removed) = registry.remove(&p("a")).unwrap();

        assert_eq!(entry.state(), ConnectionState::Closed);
        assert_eq!(removed.unwrap().color, PlayerColor::Teal);
        assert!(registry.available_colors().contains(&PlayerColor::Teal));
        assert!(!registry.contains(&p("a")));
    }

    #[tokio::test]
    async fn test_removing_entry_aborts_its_reader() {
        let net = MemoryNetwork::new();
        let mut listener = net.listen(Some("host")).await.unwrap();
        let mut registry = ConnectionRegistry::new(p("host"));
        let conn = link(&net, &mut listener, "a").await;
        registry.insert(p("a"), conn, ConnectionState::Open, p("a"));
        let reader = tokio::spawn(std::future::pending::<()>());
        registry.set_reader(&p("a"), reader.abort_handle());

        drop(registry.remove(&p("a")));

        assert!(reader.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_drain_keeps_only_local_profile() {
        let net = MemoryNetwork::new();
        let mut listener = net.listen(Some("host")).await.unwrap();
        let mut registry = ConnectionRegistry::new(p("host"));
        registry.set_profile(profile("host", PlayerColor::Coral));
        registry.set_profile(profile("a", PlayerColor::Teal));
        let conn = link(&net, &mut listener, "a").await;
        registry.insert(p("a"), conn, ConnectionState::Open, p("a"));

        let drained = registry.drain();

        assert_eq!(drained.len(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.profiles().len(), 1);
        assert!(registry.local_profile().is_some());
    }

    // =====================================================================
    // Colors
    // =====================================================================

    #[test]
    fn test_available_colors_excludes_live_profiles() {
        let mut registry = ConnectionRegistry::<MemoryConnection>::new(p("me"));
        registry.set_profile(profile("me", PlayerColor::Coral));
        registry.set_profile(profile("x", PlayerColor::Sky));

        let available = registry.available_colors();

        assert_eq!(available.len(), 4);
        assert!(!available.contains(&PlayerColor::Coral));
        assert!(!available.contains(&PlayerColor::Sky));
    }

    #[test]
    fn test_assign_color_keeps_free_preference() {
        let mut registry = ConnectionRegistry::<MemoryConnection>::new(p("me"));
        registry.set_profile(profile("x", PlayerColor::Coral));
        assert_eq!(
            registry.assign_color(&p("me"), Some(PlayerColor::Plum)),
            Some(PlayerColor::Plum)
        );
    }

    #[test]
    fn test_assign_color_taken_preference_falls_back_to_first_free() {
        let mut registry = ConnectionRegistry::<MemoryConnection>::new(p("me"));
        registry.set_profile(profile("x", PlayerColor::Coral));
        assert_eq!(
            registry.assign_color(&p("me"), Some(PlayerColor::Coral)),
            Some(PlayerColor::Teal)
        );
    }

    #[test]
    fn test_assign_color_ignores_own_current_color() {
        let mut registry = ConnectionRegistry::<MemoryConnection>::new(p("me"));
        registry.set_profile(profile("me", PlayerColor::Sage));
        assert_eq!(
            registry.assign_color(&p("me"), Some(PlayerColor::Sage)),
            Some(PlayerColor::Sage)
        );
    }

    #[test]
    fn test_assign_color_exhausted_palette_returns_none() {
        let mut registry = ConnectionRegistry::<MemoryConnection>::new(p("me"));
        for (i, color) in PlayerColor::ALL.into_iter().enumerate() {
            registry.set_profile(profile(&format!("p{i}"), color));
        }
        assert_eq!(registry.assign_color(&p("me"), None), None);
    }
}
