//! Quorum-based peer connection orchestration.
//!
//! Given N candidate peers and a minimum required success count R, launch
//! one concurrent connection attempt per candidate and consume outcomes in
//! completion order: succeed as soon as R attempts have connected, fail as
//! soon as more than N − R have failed (the quorum is then unreachable),
//! and stop promptly on external cancellation. Attempts still in flight at
//! a terminal transition are left to run to completion; their results are
//! discarded.

use async_trait::async_trait;
use onionmesh_common::{Error, PeerInfo, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One connection attempt: resolve the peer, record it, dial it
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, peer: &PeerInfo) -> Result<()>;
}

/// Outcome of a quorum round that met its threshold
#[derive(Debug)]
pub struct QuorumReport {
    /// Successes counted toward the quorum
    pub connected: usize,

    /// Failures recorded before the quorum was met
    pub failures: Vec<Error>,
}

struct AttemptOutcome {
    peer: PeerInfo,
    result: Result<()>,
}

/// Connect to at least `min_required` of `peers`.
///
/// `min_required` is clamped to the candidate count; zero succeeds
/// immediately without launching any attempt. `stagger` delays successive
/// attempt launches (pass `Duration::ZERO` to disable). Cancellation stops
/// the wait promptly but does not abort in-flight attempts.
pub async fn connect_quorum(
    connector: Arc<dyn PeerConnector>,
    peers: Vec<PeerInfo>,
    min_required: usize,
    stagger: Duration,
    cancel: CancellationToken,
) -> Result<QuorumReport> {
    let total = peers.len();
    let required = min_required.min(total);
    if required == 0 {
        debug!("quorum of zero, nothing to connect");
        return Ok(QuorumReport {
            connected: 0,
            failures: Vec::new(),
        });
    }

    // How many failures we can absorb and still reach the quorum.
    let budget = total - required;
    debug!(total, required, "starting peer connection attempts");

    // Capacity equal to the attempt count: a straggler finishing after the
    // terminal transition sends without blocking, then ends. Nothing leaks.
    let (tx, mut rx) = mpsc::channel::<AttemptOutcome>(total);
    for peer in peers {
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }
        let connector = connector.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            debug!(peer = %peer.peer_id, "attempting peer connection");
            let result = connector.connect(&peer).await;
            let _ = tx.send(AttemptOutcome { peer, result }).await;
        });
    }
    drop(tx);

    let mut connected = 0;
    let mut failures = Vec::new();
    loop {
        tokio::select! {
            outcome = rx.recv() => match outcome {
                Some(AttemptOutcome { peer, result: Ok(()) }) => {
                    connected += 1;
                    debug!(peer = %peer.peer_id, connected, required, "peer connected");
                    if connected >= required {
                        return Ok(QuorumReport { connected, failures });
                    }
                }
                Some(AttemptOutcome { peer, result: Err(err) }) => {
                    warn!(peer = %peer.peer_id, %err, "peer connection failed");
                    failures.push(err);
                    if failures.len() > budget {
                        return Err(Error::QuorumUnreachable { causes: failures });
                    }
                }
                // Every attempt reports exactly once, so the channel only
                // drains early if an attempt task panicked.
                None => return Err(Error::QuorumUnreachable { causes: failures }),
            },
            _ = cancel.cancelled() => {
                debug!(connected, failed = failures.len(), "quorum round cancelled");
                return Err(Error::Cancelled { causes: failures });
            }
        }
    }
}
