use super::{HiddenService, OverlaySession, RawStream};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Optional message-framed sub-protocol layered over raw overlay streams,
/// selectable per transport instance via the `/ws` address suffix.
#[async_trait]
pub trait FramedLayer: Send + Sync {
    /// Build a dialer whose underlying dial primitive is `session`, with
    /// the given handshake deadline
    fn dialer(
        &self,
        session: Arc<dyn OverlaySession>,
        handshake_timeout: Duration,
    ) -> Arc<dyn FramedDialer>;

    /// Wrap a hidden service's raw accept source with the sub-protocol
    async fn listener(&self, service: Arc<dyn HiddenService>) -> anyhow::Result<Box<dyn RawAcceptor>>;
}

/// Dialer that performs the sub-protocol handshake on top of an overlay
/// stream
#[async_trait]
pub trait FramedDialer: Send + Sync {
    async fn dial(&self, host: &str, port: u16) -> anyhow::Result<RawStream>;
}

/// A source of accepted raw streams
#[async_trait]
pub trait RawAcceptor: Send + Sync {
    /// Wait for the next stream and its remote endpoint in text form
    async fn accept(&self) -> anyhow::Result<(RawStream, String)>;
}
