use super::{Connection, OnionConn};
use async_trait::async_trait;
use onionmesh_common::PeerId;

/// External collaborator that negotiates transport security and stream
/// multiplexing on top of a raw overlay connection.
///
/// On failure an implementation must not retain the connection it was
/// given; dropping it closes the underlying stream.
#[async_trait]
pub trait Upgrader: Send + Sync {
    async fn upgrade_outbound(
        &self,
        conn: OnionConn,
        peer: &PeerId,
    ) -> anyhow::Result<Box<dyn Connection>>;

    async fn upgrade_inbound(&self, conn: OnionConn) -> anyhow::Result<Box<dyn Connection>>;
}

/// Pass-through upgrader for stacks that negotiate security elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainUpgrader;

#[async_trait]
impl Upgrader for PlainUpgrader {
    async fn upgrade_outbound(
        &self,
        conn: OnionConn,
        _peer: &PeerId,
    ) -> anyhow::Result<Box<dyn Connection>> {
        Ok(Box::new(conn))
    }

    async fn upgrade_inbound(&self, conn: OnionConn) -> anyhow::Result<Box<dyn Connection>> {
        Ok(Box::new(conn))
    }
}
