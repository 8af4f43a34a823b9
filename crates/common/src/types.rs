use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, globally unique identifier for a network participant.
///
/// The string form is stable and is what gets used as a map key; nothing in
/// this crate interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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

/// A peer as reachable through the overlay: its identity plus the hidden
/// service it listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer's identity
    pub peer_id: PeerId,

    /// Overlay service identity (base32, without suffix)
    pub service_id: String,

    /// Port the service listens on (1-65535)
    pub port: u16,
}

impl PeerInfo {
    pub fn new(peer_id: PeerId, service_id: impl Into<String>, port: u16) -> Self {
        Self {
            peer_id,
            service_id: service_id.into(),
            port,
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.peer_id, self.service_id, self.port)
    }
}
