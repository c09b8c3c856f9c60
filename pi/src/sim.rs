//! Simulated bring-up of a topology
//!
//! Runs a real coordinator over in-process channels. Each peer follows the
//! handshake with the delays from its [`PeerSpec`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::coordinator::{
    CoordMessage, Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorMetrics, MpscChannelProvider,
    PeerEndpoint, PeerId,
};
use crate::topology::{PeerSpec, Topology};

/// Outcome of one simulated peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerReport {
    pub name: String,
    pub origin: String,
    pub id: PeerId,
    pub success: bool,
    /// Time from registration to callback
    #[serde(rename = "elapsed-ms")]
    pub elapsed_ms: u64,
}

/// Outcome of a whole run, in registration order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub peers: Vec<PeerReport>,
    pub metrics: CoordinatorMetrics,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.peers.iter().all(|p| p.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PeerReport> {
        self.peers.iter().filter(|p| !p.success)
    }
}

/// Play one peer's side of the handshake
async fn simulate_peer(mut endpoint: PeerEndpoint, spec: PeerSpec) {
    tokio::time::sleep(Duration::from_millis(spec.loaded_after_ms)).await;
    if endpoint.loaded().await.is_err() {
        return;
    }

    match endpoint.recv().await {
        Some(CoordMessage::RegisterOrigin { origin }) => {
            debug!(peer = %spec.name, trusted = %origin, "Simulated peer got trusted origin");
        }
        None => return,
    }

    let Some(ready_after_ms) = spec.ready_after_ms else {
        debug!(peer = %spec.name, "Simulated peer never becomes ready");
        return;
    };
    tokio::time::sleep(Duration::from_millis(ready_after_ms)).await;
    let _ = endpoint.ready().await;
}

/// A live coordinator and the task that starts simulated peers for it
struct Session {
    handle: CoordinatorHandle,
    task: JoinHandle<()>,
    driver: JoinHandle<()>,
}

impl Session {
    fn start(topology: &Topology, config: &CoordinatorConfig) -> Self {
        let (provider, mut opened) = MpscChannelProvider::new(config.channel_buffer);
        let (handle, task) = Coordinator::new(config.clone(), Arc::new(provider)).spawn();

        let specs: HashMap<String, PeerSpec> = topology.peers.iter().map(|p| (p.origin.clone(), p.clone())).collect();
        let driver = tokio::spawn(async move {
            while let Some(endpoint) = opened.recv().await {
                if let Some(spec) = specs.get(&endpoint.origin) {
                    tokio::spawn(simulate_peer(endpoint, spec.clone()));
                }
            }
        });

        Self { handle, task, driver }
    }

    /// Register every peer in order and wait for all outcomes
    async fn bring_up(&self, topology: &Topology, timeout: Duration) -> Result<RunReport> {
        self.handle.configure(&topology.own_origin, timeout).await?;

        let mut ids: HashMap<&str, PeerId> = HashMap::new();
        let mut pending = Vec::with_capacity(topology.peers.len());
        for peer in &topology.peers {
            let deps = peer
                .depends_on
                .iter()
                .map(|name| ids.get(name.as_str()).copied().ok_or_else(|| eyre!("Unknown dependency {}", name)))
                .collect::<Result<Vec<_>>>()?;

            let started = Instant::now();
            let (id, outcome) = self
                .handle
                .register_with_outcome(&peer.origin, &deps)
                .await
                .context(format!("Failed to register {}", peer.name))?;
            ids.insert(peer.name.as_str(), id);

            let name = peer.name.clone();
            let origin = peer.origin.clone();
            pending.push(async move {
                let success = outcome.await.map(|o| o.success).unwrap_or(false);
                PeerReport {
                    name,
                    origin,
                    id,
                    success,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            });
        }

        let peers = join_all(pending).await;
        let metrics = self.handle.metrics().await?;
        Ok(RunReport { peers, metrics })
    }

    /// Stop the coordinator and the peer driver
    async fn close(self) {
        if let Err(e) = self.handle.shutdown().await {
            debug!(error = %e, "Coordinator already stopped");
        }
        let _ = self.task.await;
        self.driver.abort();
    }
}

/// Bring up every peer in `topology` and wait for all outcomes
pub async fn run_topology(topology: &Topology, config: &CoordinatorConfig) -> Result<RunReport> {
    topology.validate()?;

    let timeout = Duration::from_millis(topology.timeout_ms.unwrap_or(config.timeout_ms));
    let session = Session::start(topology, config);
    let result = session.bring_up(topology, timeout).await;
    session.close().await;
    let report = result?;

    info!(
        peers = report.peers.len(),
        failed = report.failed().count(),
        "Topology run complete"
    );
    Ok(report)
}
