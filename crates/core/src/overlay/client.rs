use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// A raw byte stream carried over the overlay
pub type RawStream = Box<dyn OverlayStream>;

pub trait OverlayStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> OverlayStream for T {}

/// Client handle to the onion-routing overlay
#[async_trait]
pub trait OverlayClient: Send + Sync {
    /// Open a client session capable of dialing through the overlay.
    ///
    /// Called at most once per transport instance; the returned session is
    /// shared across every subsequent dial.
    async fn open_session(&self) -> anyhow::Result<Arc<dyn OverlaySession>>;

    /// Register a new hidden-service identity and start accepting on it
    async fn publish_service(&self) -> anyhow::Result<Arc<dyn HiddenService>>;
}

/// An open overlay session
#[async_trait]
pub trait OverlaySession: Send + Sync {
    /// Open a stream to `host:port` through the overlay.
    ///
    /// Implementations must support concurrent dials on one session.
    async fn dial(&self, host: &str, port: u16) -> anyhow::Result<RawStream>;
}

/// A published hidden service: owns the registration and the raw accept
/// source.
#[async_trait]
pub trait HiddenService: Send + Sync {
    /// Service identity, base32 without suffix
    fn id(&self) -> &str;

    /// Externally reachable port
    fn port(&self) -> u16;

    /// Wait for the next inbound stream along with the remote endpoint in
    /// text form (`ip:port` or `<id>.onion:<port>`)
    async fn accept(&self) -> anyhow::Result<(RawStream, String)>;

    /// Tear down the registration. Idempotent.
    async fn close(&self) -> anyhow::Result<()>;
}
