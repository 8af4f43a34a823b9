//! Local peer directory.
//!
//! Append-only, concurrency-safe registry of peers we have resolved,
//! consulted before each connection attempt. Entries are never overwritten
//! or removed.

use onionmesh_common::{PeerId, PeerInfo};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry of resolved peers keyed by identity
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: RwLock<HashMap<PeerId, PeerInfo>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer. Returns false if the peer was already known; the
    /// existing entry is kept.
    pub fn insert(&self, info: PeerInfo) -> bool {
        let mut peers = self.peers.write().expect("peer directory lock poisoned");
        if peers.contains_key(&info.peer_id) {
            return false;
        }
        peers.insert(info.peer_id.clone(), info);
        true
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<PeerInfo> {
        self.peers
            .read()
            .expect("peer directory lock poisoned")
            .get(peer_id)
            .cloned()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers
            .read()
            .expect("peer directory lock poisoned")
            .contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("peer directory lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every known peer
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.peers
            .read()
            .expect("peer directory lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
