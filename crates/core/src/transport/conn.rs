use super::Connection;
use crate::addr::StructuredAddr;
use crate::overlay::RawStream;
use onionmesh_common::PeerId;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Direction a connection was established in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A raw overlay stream wrapped as a directional, address-tagged
/// connection.
///
/// Handed to the upgrade collaborator for security and multiplexing
/// negotiation; dropping it closes the underlying stream.
pub struct OnionConn {
    stream: RawStream,
    local: StructuredAddr,
    remote: StructuredAddr,
    direction: Direction,
    peer_id: Option<PeerId>,
}

impl OnionConn {
    pub(crate) fn outbound(stream: RawStream, remote: StructuredAddr, peer_id: PeerId) -> Self {
        Self {
            stream,
            // an outbound overlay connection has no externally meaningful
            // local endpoint
            local: StructuredAddr::empty(),
            remote,
            direction: Direction::Outbound,
            peer_id: Some(peer_id),
        }
    }

    pub(crate) fn inbound(stream: RawStream, local: StructuredAddr, remote: StructuredAddr) -> Self {
        Self {
            stream,
            local,
            remote,
            direction: Direction::Inbound,
            peer_id: None,
        }
    }

    /// Unwrap into the raw byte stream, for upgraders that re-frame it
    pub fn into_stream(self) -> RawStream {
        self.stream
    }
}

impl std::fmt::Debug for OnionConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnionConn")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("direction", &self.direction)
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

impl Connection for OnionConn {
    fn local_addr(&self) -> &StructuredAddr {
        &self.local
    }

    fn remote_addr(&self) -> &StructuredAddr {
        &self.remote
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }
}

impl AsyncRead for OnionConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for OnionConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
