//! Content-routing facade over the DHT collaborator.
//!
//! The lookup algorithm itself (Provide/FindProviders) is a black box
//! behind `ProviderRouting`; this module hashes application identifiers
//! into content keys, converts provider records into reachable peers, and
//! drives quorum connection rounds against them.

use crate::addr::{OnionAddrCodec, StructuredAddr};
use crate::peer::PeerDirectory;
use crate::quorum::{connect_quorum, PeerConnector, QuorumReport};
use crate::transport::{Connection, Transport};
use async_trait::async_trait;
use onionmesh_common::config::quorum as quorum_cfg;
use onionmesh_common::{Error, PeerId, PeerInfo, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Domain-separated hash of an application content identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    pub fn for_id(id: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ONIONMESH-PROVIDE-V1");
        hasher.update(id);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short prefix is enough to correlate log lines
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A provider as the routing black box reports it
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub peer_id: PeerId,
    pub addr: StructuredAddr,
}

/// The DHT content-routing collaborator
#[async_trait]
pub trait ProviderRouting: Send + Sync {
    /// Announce that we provide `key`
    async fn provide(&self, key: ContentKey) -> anyhow::Result<()>;

    /// Stream up to `max_count` providers of `key`
    async fn find_providers(
        &self,
        key: ContentKey,
        max_count: usize,
    ) -> anyhow::Result<mpsc::Receiver<ProviderRecord>>;

    /// Shut the routing table down
    async fn close(&self) -> anyhow::Result<()>;
}

/// The peer-to-peer host collaborator, as far as this facade needs it
#[async_trait]
pub trait HostControl: Send + Sync {
    async fn close(&self) -> anyhow::Result<()>;
}

/// DHT-backed mesh client: provide/find content, connect to a quorum of
/// the peers found.
pub struct MeshDht {
    local_id: PeerId,
    routing: Box<dyn ProviderRouting>,
    host: Box<dyn HostControl>,
    transport: Arc<dyn Transport>,
    directory: Arc<PeerDirectory>,
    codec: OnionAddrCodec,
    /// Whether peer addresses are rendered with the framed suffix
    framed: bool,
    local: RwLock<Option<PeerInfo>>,
    /// Connections held open on behalf of the surrounding stack
    active: Mutex<Vec<Box<dyn Connection>>>,
    closed: AtomicBool,
}

impl MeshDht {
    pub fn new(
        local_id: PeerId,
        routing: Box<dyn ProviderRouting>,
        host: Box<dyn HostControl>,
        transport: Arc<dyn Transport>,
        codec: OnionAddrCodec,
        framed: bool,
    ) -> Self {
        Self {
            local_id,
            routing,
            host,
            transport,
            directory: Arc::new(PeerDirectory::new()),
            codec,
            framed,
            local: RwLock::new(None),
            active: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Our own reachable peer info, once a listener exists
    pub fn local_peer_info(&self) -> Option<PeerInfo> {
        self.local.read().expect("local info lock poisoned").clone()
    }

    /// Derive our own peer info from the transport's listen addresses
    pub fn set_local_from_listeners(&self, addrs: &[StructuredAddr]) -> Result<()> {
        match addrs {
            [] => Ok(()),
            [addr] => {
                let (service_id, port) = self.codec.decode(addr)?;
                let info = PeerInfo::new(self.local_id.clone(), service_id, port);
                debug!(%info, "local peer info resolved");
                *self.local.write().expect("local info lock poisoned") = Some(info);
                Ok(())
            }
            more => Err(Error::invalid_address(format!(
                "expected at most one overlay listen address, got {}",
                more.len()
            ))),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active.lock().expect("connection list lock poisoned").len()
    }

    /// Announce content under the hashed identifier
    pub async fn provide(&self, id: &[u8]) -> anyhow::Result<()> {
        let key = ContentKey::for_id(id);
        debug!(%key, "announcing content");
        self.routing.provide(key).await
    }

    /// Lazily stream providers of `id`, at most `max_count` of them.
    ///
    /// The stream ends when the routing layer runs dry, `max_count` is
    /// reached, or the receiver is dropped (the caller's deadline expired).
    /// Providers whose address cannot be resolved are skipped.
    pub async fn find_providers(
        &self,
        id: &[u8],
        max_count: usize,
    ) -> anyhow::Result<mpsc::Receiver<PeerInfo>> {
        let key = ContentKey::for_id(id);
        debug!(%key, max_count, "finding providers");

        let mut records = self.routing.find_providers(key, max_count).await?;
        let codec = self.codec;
        let (tx, rx) = mpsc::channel(max_count.max(1));
        tokio::spawn(async move {
            let mut sent = 0;
            while sent < max_count {
                let Some(record) = records.recv().await else { break };
                let info = match codec.decode(&record.addr) {
                    Ok((service_id, port)) => {
                        PeerInfo::new(record.peer_id, service_id, port)
                    }
                    Err(err) => {
                        warn!(peer = %record.peer_id, %err, "skipping provider with unresolvable address");
                        continue;
                    }
                };
                if tx.send(info).await.is_err() {
                    break;
                }
                sent += 1;
            }
        });

        Ok(rx)
    }

    /// Connect to at least `min_required` of `peers`
    pub async fn connect_peers(
        self: &Arc<Self>,
        peers: Vec<PeerInfo>,
        min_required: usize,
        cancel: CancellationToken,
    ) -> Result<QuorumReport> {
        let connector: Arc<dyn PeerConnector> = self.clone();
        connect_quorum(
            connector,
            peers,
            min_required,
            Duration::from_millis(quorum_cfg::ATTEMPT_STAGGER_MS),
            cancel,
        )
        .await
    }

    /// Close the routing table, then the host. Idempotent.
    ///
    /// When both closes fail, the host error is the one reported.
    pub async fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut result = self.routing.close().await;
        if let Err(host_err) = self.host.close().await {
            result = Err(host_err);
        }
        result
    }
}

#[async_trait]
impl PeerConnector for MeshDht {
    async fn connect(&self, peer: &PeerInfo) -> Result<()> {
        let addr = self
            .codec
            .service_addr(&peer.service_id, peer.port, self.framed)?;
        self.directory.insert(peer.clone());

        let conn = self.transport.dial(&addr, &peer.peer_id).await?;
        debug!(peer = %peer.peer_id, "peer connected");
        self.active
            .lock()
            .expect("connection list lock poisoned")
            .push(conn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Protocol;
    use crate::transport::{Listener, OnionConn};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn content_keys_are_deterministic_and_distinct() {
        let a = ContentKey::for_id(b"some-content");
        let b = ContentKey::for_id(b"some-content");
        let c = ContentKey::for_id(b"other-content");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string().len(), 16);
    }

    #[derive(Default)]
    struct StubRouting {
        closes: AtomicUsize,
        close_fails: bool,
        records: Mutex<Vec<ProviderRecord>>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ProviderRouting for StubRouting {
        async fn provide(&self, _key: ContentKey) -> anyhow::Result<()> {
            Ok(())
        }

        async fn find_providers(
            &self,
            _key: ContentKey,
            max_count: usize,
        ) -> anyhow::Result<mpsc::Receiver<ProviderRecord>> {
            let records = std::mem::take(&mut *self.records.lock().unwrap());
            let (tx, rx) = mpsc::channel(max_count.max(records.len()).max(1));
            for record in records {
                tx.try_send(record).unwrap();
            }
            Ok(rx)
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push("routing");
            if self.close_fails {
                anyhow::bail!("routing table close failed");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubHost {
        closes: AtomicUsize,
        close_fails: bool,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl HostControl for StubHost {
        async fn close(&self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push("host");
            if self.close_fails {
                anyhow::bail!("host close failed");
            }
            Ok(())
        }
    }

    /// Transport stub that accepts every dial and counts them
    #[derive(Default)]
    struct StubTransport {
        dials: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn dial(
            &self,
            addr: &StructuredAddr,
            peer: &PeerId,
        ) -> Result<Box<dyn Connection>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(Error::dial_failed(format!("{peer} unreachable")));
            }
            let (near, _far) = tokio::io::duplex(8);
            Ok(Box::new(OnionConn::outbound(
                Box::new(near),
                addr.clone(),
                peer.clone(),
            )))
        }

        async fn listen(&self, _addr: &StructuredAddr) -> Result<Box<dyn Listener>> {
            Err(Error::invalid_address("listen not supported by stub"))
        }

        fn can_dial(&self, _addr: &StructuredAddr) -> bool {
            true
        }

        fn protocols(&self) -> &'static [Protocol] {
            &[Protocol::OnionService]
        }

        fn proxy(&self) -> bool {
            true
        }
    }

    fn mesh(routing: StubRouting, host: StubHost, transport: StubTransport) -> Arc<MeshDht> {
        Arc::new(MeshDht::new(
            PeerId::new("QmSelf"),
            Box::new(routing),
            Box::new(host),
            Arc::new(transport),
            OnionAddrCodec::new(),
            false,
        ))
    }

    fn record(n: usize) -> ProviderRecord {
        ProviderRecord {
            peer_id: PeerId::new(format!("QmPeer{n}")),
            addr: StructuredAddr::onion_service(format!("svc{n}aaaaaaaaaaaa"), 4001),
        }
    }

    #[tokio::test]
    async fn close_runs_routing_then_host_and_is_idempotent() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let routing = StubRouting {
            order: order.clone(),
            ..Default::default()
        };
        let host = StubHost {
            order: order.clone(),
            ..Default::default()
        };
        let mesh = mesh(routing, host, StubTransport::default());

        mesh.close().await.unwrap();
        mesh.close().await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["routing", "host"]);
    }

    #[tokio::test]
    async fn host_close_error_takes_precedence() {
        let routing = StubRouting {
            close_fails: true,
            ..Default::default()
        };
        let host = StubHost {
            close_fails: true,
            ..Default::default()
        };
        let mesh = mesh(routing, host, StubTransport::default());

        let err = mesh.close().await.unwrap_err();
        assert!(err.to_string().contains("host close failed"));
    }

    #[tokio::test]
    async fn find_providers_maps_and_bounds_results() {
        let routing = StubRouting::default();
        {
            let mut records = routing.records.lock().unwrap();
            records.push(record(2));
            // unresolvable: a listen marker is not a dialable address
            records.push(ProviderRecord {
                peer_id: PeerId::new("QmBroken"),
                addr: StructuredAddr::listen_marker(),
            });
            records.push(record(3));
            records.push(record(4));
        }
        let mesh = mesh(routing, StubHost::default(), StubTransport::default());

        let mut rx = mesh.find_providers(b"content", 2).await.unwrap();
        let mut found = Vec::new();
        while let Some(info) = rx.recv().await {
            found.push(info);
        }

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].peer_id, PeerId::new("QmPeer2"));
        assert_eq!(found[1].peer_id, PeerId::new("QmPeer3"));
        assert_eq!(found[0].port, 4001);
    }

    #[tokio::test]
    async fn connect_peers_records_and_dials() {
        let mesh = mesh(
            StubRouting::default(),
            StubHost::default(),
            StubTransport::default(),
        );
        let peers: Vec<PeerInfo> = (2..=4)
            .map(|n| {
                PeerInfo::new(
                    PeerId::new(format!("QmPeer{n}")),
                    format!("svc{n}aaaaaaaaaaaa"),
                    4001,
                )
            })
            .collect();

        let report = mesh
            .connect_peers(peers, 3, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.connected, 3);
        assert_eq!(mesh.directory().len(), 3);
        assert_eq!(mesh.active_connections(), 3);
    }

    #[tokio::test]
    async fn connect_peers_surfaces_quorum_failure() {
        let transport = StubTransport {
            refuse: true,
            ..Default::default()
        };
        let mesh = mesh(StubRouting::default(), StubHost::default(), transport);
        let peers = vec![PeerInfo::new(PeerId::new("QmPeer2"), "svc2aaaaaaaaaaaa", 4001)];

        let err = mesh
            .connect_peers(peers, 1, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuorumUnreachable { .. }));
    }

    #[test]
    fn local_peer_info_from_listener_addresses() {
        let mesh = mesh(
            StubRouting::default(),
            StubHost::default(),
            StubTransport::default(),
        );
        assert!(mesh.local_peer_info().is_none());

        let addr: StructuredAddr = "abcdefghijklmnop.onion:4001".parse().unwrap();
        mesh.set_local_from_listeners(std::slice::from_ref(&addr))
            .unwrap();
        let local = mesh.local_peer_info().unwrap();
        assert_eq!(local.peer_id, PeerId::new("QmSelf"));
        assert_eq!(local.service_id, "abcdefghijklmnop");
        assert_eq!(local.port, 4001);

        let err = mesh
            .set_local_from_listeners(&[addr.clone(), addr])
            .unwrap_err();
        assert!(matches!(err, Error::AddressFormatInvalid(_)));
    }
}
