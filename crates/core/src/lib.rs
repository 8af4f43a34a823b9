pub mod addr;
pub mod overlay;
pub mod peer;
pub mod quorum;
pub mod routing;
pub mod transport;

pub use addr::{OnionAddrCodec, Protocol, Segment, StructuredAddr};
pub use overlay::{
    FramedDialer, FramedLayer, HiddenService, OverlayClient, OverlaySession, RawAcceptor,
    RawStream,
};

// Re-export transport types
pub use transport::{
    Connection, Direction, Listener, OnionConn, OnionListener, OnionTransport, PlainUpgrader,
    Transport, Upgrader,
};

// Re-export peer and quorum types
pub use peer::PeerDirectory;
pub use quorum::{connect_quorum, PeerConnector, QuorumReport};

// Re-export content-routing types
pub use routing::{ContentKey, HostControl, MeshDht, ProviderRecord, ProviderRouting};
