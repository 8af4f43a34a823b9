//! Overlay transport: dial and listen through the onion-routing overlay
//! behind a generic pluggable-transport contract.
//!
//! The surrounding peer-to-peer stack sees `Transport`, `Listener`, and
//! `Connection` capability traits; it never learns that the bytes travel
//! through an anonymizing overlay.

mod conn;
mod listener;
mod onion;
mod upgrade;

pub use conn::{Direction, OnionConn};
pub use listener::{OnionListener, UpgradedListener};
pub use onion::OnionTransport;
pub use upgrade::{PlainUpgrader, Upgrader};

use crate::addr::{Protocol, StructuredAddr};
use async_trait::async_trait;
use onionmesh_common::{PeerId, Result};
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport contract exposed to the surrounding peer-to-peer stack
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial `addr` expecting to reach `peer`; returns the upgraded
    /// connection
    async fn dial(&self, addr: &StructuredAddr, peer: &PeerId) -> Result<Box<dyn Connection>>;

    /// Start listening. `addr` must be the listen-request marker.
    async fn listen(&self, addr: &StructuredAddr) -> Result<Box<dyn Listener>>;

    /// Whether this transport can handle `addr`. Must not have side
    /// effects; used for address-family routing.
    fn can_dial(&self, addr: &StructuredAddr) -> bool;

    /// Address protocol tags this transport covers
    fn protocols(&self) -> &'static [Protocol];

    /// True: addresses dialed through this transport are not directly
    /// observable or routable outside it
    fn proxy(&self) -> bool;
}

/// An established connection tagged with structured local/remote addresses
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {
    fn local_addr(&self) -> &StructuredAddr;

    fn remote_addr(&self) -> &StructuredAddr;

    fn direction(&self) -> Direction;

    /// Expected peer identity, known on the dial path only
    fn peer_id(&self) -> Option<&PeerId>;
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("local", self.local_addr())
            .field("remote", self.remote_addr())
            .field("direction", &self.direction())
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}

/// Accept/Close/Addr contract of an active listen session
#[async_trait]
pub trait Listener: Send {
    /// Block until a connection arrives or the underlying source closes
    async fn accept(&mut self) -> Result<Box<dyn Connection>>;

    /// Tear down the hidden-service registration. Idempotent.
    async fn close(&mut self) -> Result<()>;

    /// The externally reachable address of this listener
    fn addr(&self) -> &StructuredAddr;
}
