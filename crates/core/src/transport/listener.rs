use super::{Connection, Listener, OnionConn, Upgrader};
use crate::addr::StructuredAddr;
use crate::overlay::{HiddenService, RawAcceptor, RawStream};
use async_trait::async_trait;
use onionmesh_common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where accepted streams come from: the hidden service's raw source, or a
/// framed sub-protocol listener layered over it.
pub(crate) enum AcceptSource {
    Direct,
    Framed(Box<dyn RawAcceptor>),
}

/// An active listen session for one hidden-service registration
pub struct OnionListener {
    service: Arc<dyn HiddenService>,
    addr: StructuredAddr,
    source: AcceptSource,
    closed: bool,
}

impl std::fmt::Debug for OnionListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnionListener")
            .field("addr", &self.addr)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl OnionListener {
    pub(crate) fn new(
        service: Arc<dyn HiddenService>,
        addr: StructuredAddr,
        source: AcceptSource,
    ) -> Self {
        Self {
            service,
            addr,
            source,
            closed: false,
        }
    }

    /// The externally reachable address derived from the registration
    pub fn addr(&self) -> &StructuredAddr {
        &self.addr
    }

    /// Accept the next raw connection, without upgrading it.
    ///
    /// An endpoint that cannot be parsed into a structured address fails
    /// that one accept; the listener itself stays usable.
    pub async fn accept_raw(&mut self) -> Result<OnionConn> {
        if self.closed {
            return Err(Error::ListenerClosed);
        }

        let accepted = match &self.source {
            AcceptSource::Direct => self.service.accept().await,
            AcceptSource::Framed(acceptor) => acceptor.accept().await,
        };

        let (stream, endpoint): (RawStream, String) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                debug!(%err, "accept source closed");
                return Err(Error::ListenerClosed);
            }
        };

        let remote: StructuredAddr = endpoint.parse().map_err(|err| {
            Error::invalid_address(format!("peer endpoint '{endpoint}': {err}"))
        })?;

        debug!(remote = %remote, "accepted overlay connection");
        Ok(OnionConn::inbound(stream, self.addr.clone(), remote))
    }

    /// Tear down the hidden-service registration.
    ///
    /// Idempotent; teardown failures are logged, not surfaced.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(err) = self.service.close().await {
            warn!(%err, id = self.service.id(), "hidden service teardown failed");
        }
        Ok(())
    }

    /// Wrap this listener so every accepted connection goes through the
    /// upgrade collaborator before it reaches the surrounding stack
    pub fn upgrade(self, upgrader: Arc<dyn Upgrader>) -> UpgradedListener {
        UpgradedListener {
            inner: self,
            upgrader,
        }
    }
}

#[async_trait]
impl Listener for OnionListener {
    async fn accept(&mut self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(self.accept_raw().await?))
    }

    async fn close(&mut self) -> Result<()> {
        OnionListener::close(self).await
    }

    fn addr(&self) -> &StructuredAddr {
        &self.addr
    }
}

/// Listener wrapper that upgrades each inbound connection
pub struct UpgradedListener {
    inner: OnionListener,
    upgrader: Arc<dyn Upgrader>,
}

#[async_trait]
impl Listener for UpgradedListener {
    async fn accept(&mut self) -> Result<Box<dyn Connection>> {
        let conn = self.inner.accept_raw().await?;
        self.upgrader
            .upgrade_inbound(conn)
            .await
            .map_err(|err| Error::UpgradeFailed(err.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    fn addr(&self) -> &StructuredAddr {
        self.inner.addr()
    }
}
