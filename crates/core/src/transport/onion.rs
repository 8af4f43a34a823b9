use super::listener::AcceptSource;
use super::{Connection, Listener, OnionConn, OnionListener, Transport, Upgrader};
use crate::addr::{OnionAddrCodec, Protocol, StructuredAddr};
use crate::overlay::{FramedDialer, FramedLayer, HiddenService, OverlayClient, OverlaySession, RawStream};
use async_trait::async_trait;
use onionmesh_common::{Error, PeerId, Result, TransportConfig};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Protocol tags handled by the overlay transport
const PROTOCOLS: &[Protocol] = &[Protocol::OnionService, Protocol::Tcp, Protocol::OnionListen];

/// Lazily created dial state: the overlay session shared by every dial of
/// this transport instance, plus the framed dialer layered on it when the
/// sub-protocol is configured.
struct DialSession {
    session: Arc<dyn OverlaySession>,
    framed: Option<Arc<dyn FramedDialer>>,
}

/// Connection-oriented transport that routes all traffic through the
/// onion-routing overlay.
pub struct OnionTransport {
    overlay: Arc<dyn OverlayClient>,
    upgrader: Arc<dyn Upgrader>,
    framing: Option<Arc<dyn FramedLayer>>,
    codec: OnionAddrCodec,
    config: TransportConfig,
    session: OnceCell<DialSession>,
}

impl OnionTransport {
    /// Transport dialing raw overlay streams directly
    pub fn new(
        overlay: Arc<dyn OverlayClient>,
        upgrader: Arc<dyn Upgrader>,
        codec: OnionAddrCodec,
        config: TransportConfig,
    ) -> Self {
        Self {
            overlay,
            upgrader,
            framing: None,
            codec,
            config,
            session: OnceCell::new(),
        }
    }

    /// Transport with the framed sub-protocol layered over every dial and
    /// listener
    pub fn with_framing(
        overlay: Arc<dyn OverlayClient>,
        upgrader: Arc<dyn Upgrader>,
        framing: Arc<dyn FramedLayer>,
        codec: OnionAddrCodec,
        config: TransportConfig,
    ) -> Self {
        Self {
            framing: Some(framing),
            ..Self::new(overlay, upgrader, codec, config)
        }
    }

    /// Whether the framed sub-protocol is configured
    pub fn is_framed(&self) -> bool {
        self.framing.is_some()
    }

    /// The address codec this transport was built with
    pub fn codec(&self) -> &OnionAddrCodec {
        &self.codec
    }

    /// Open the overlay session on first use.
    ///
    /// The initializer runs at most once to completion while concurrent
    /// callers wait; once a session exists it is reused for the lifetime of
    /// this transport and never rebuilt, even if a later dial fails.
    async fn ensure_session(&self) -> Result<&DialSession> {
        self.session
            .get_or_try_init(|| async {
                debug!("opening overlay session");
                let session = self
                    .overlay
                    .open_session()
                    .await
                    .map_err(Error::SessionInitFailed)?;

                let framed = self
                    .framing
                    .as_ref()
                    .map(|layer| layer.dialer(session.clone(), self.config.handshake_timeout));

                Ok(DialSession { session, framed })
            })
            .await
    }

    async fn dial_raw(&self, session: &DialSession, host: &str, port: u16) -> Result<RawStream> {
        let attempt = async {
            match &session.framed {
                Some(dialer) => dialer.dial(host, port).await,
                None => session.session.dial(host, port).await,
            }
        };

        match timeout(self.config.dial_timeout, attempt).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(Error::dial_failed(format!("{host}:{port}: {err}"))),
            Err(_) => Err(Error::dial_failed(format!("{host}:{port}: timed out"))),
        }
    }

    /// Dial a peer's hidden service and hand the raw connection to the
    /// upgrade collaborator.
    pub async fn dial(&self, raddr: &StructuredAddr, peer: &PeerId) -> Result<Box<dyn Connection>> {
        let (service_id, port) = self.codec.decode(raddr)?;
        let host = self.codec.hostname(&service_id);
        debug!(%peer, addr = %raddr, "dialing through overlay");

        let session = self.ensure_session().await?;
        let stream = self.dial_raw(session, &host, port).await?;

        let conn = OnionConn::outbound(stream, raddr.clone(), peer.clone());
        self.upgrader
            .upgrade_outbound(conn, peer)
            .await
            .map_err(|err| {
                debug!(%peer, %err, "outbound upgrade failed");
                Error::UpgradeFailed(err.to_string())
            })
    }

    /// True iff `addr` resolves to a hidden-service endpoint. No side
    /// effects.
    pub fn can_dial(&self, addr: &StructuredAddr) -> bool {
        self.codec.decode(addr).is_ok()
    }

    /// Register a new hidden service and return its listen session.
    ///
    /// `laddr` must be the bare listen-request marker; anything else is
    /// rejected before any registration side effect.
    pub async fn listen(&self, laddr: &StructuredAddr) -> Result<OnionListener> {
        if !self.codec.is_listen_marker(laddr) {
            return Err(Error::invalid_address(format!(
                "listen requires the bare marker, got '{laddr}'"
            )));
        }

        let service = match timeout(
            self.config.service_setup_timeout,
            self.overlay.publish_service(),
        )
        .await
        {
            Ok(Ok(service)) => service,
            Ok(Err(err)) => return Err(Error::ServiceRegistrationFailed(err.to_string())),
            Err(_) => {
                return Err(Error::ServiceRegistrationFailed(
                    "registration timed out".into(),
                ))
            }
        };
        info!(id = service.id(), port = service.port(), "hidden service registered");

        let addr = match self
            .codec
            .service_addr(service.id(), service.port(), self.is_framed())
        {
            Ok(addr) => addr,
            Err(err) => {
                rollback_service(service.as_ref()).await;
                return Err(Error::listener_setup(format!(
                    "derived address invalid: {err}"
                )));
            }
        };

        // The registration must not outlive a failed listener setup.
        let source = match &self.framing {
            Some(layer) => match layer.listener(service.clone()).await {
                Ok(acceptor) => AcceptSource::Framed(acceptor),
                Err(err) => {
                    rollback_service(service.as_ref()).await;
                    return Err(Error::listener_setup(format!("framed listener: {err}")));
                }
            },
            None => AcceptSource::Direct,
        };

        debug!(addr = %addr, "overlay listener ready");
        Ok(OnionListener::new(service, addr, source))
    }
}

async fn rollback_service(service: &dyn HiddenService) {
    if let Err(err) = service.close().await {
        warn!(%err, id = service.id(), "failed tearing down hidden service after setup failure");
    }
}

#[async_trait]
impl Transport for OnionTransport {
    async fn dial(&self, addr: &StructuredAddr, peer: &PeerId) -> Result<Box<dyn Connection>> {
        OnionTransport::dial(self, addr, peer).await
    }

    async fn listen(&self, addr: &StructuredAddr) -> Result<Box<dyn Listener>> {
        let listener = OnionTransport::listen(self, addr).await?;
        Ok(Box::new(listener.upgrade(self.upgrader.clone())))
    }

    fn can_dial(&self, addr: &StructuredAddr) -> bool {
        OnionTransport::can_dial(self, addr)
    }

    fn protocols(&self) -> &'static [Protocol] {
        PROTOCOLS
    }

    fn proxy(&self) -> bool {
        true
    }
}
