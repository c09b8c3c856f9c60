//! Main Coordinator task implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::{ChannelProvider, PeerInbox};
use super::config::CoordinatorConfig;
use super::error::{CoordinatorError, ProtocolError, validate_origin};
use super::graph::DependencyGraph;
use super::handle::CoordinatorHandle;
use super::messages::{CoordMessage, CoordRequest, CoordinatorMetrics, PeerMessage};
use super::table::{PeerCallback, PeerEntry, PeerId, PeerTable};
use super::timer::{arm_safety_check, arm_timeout};

/// Result of checking a peer's dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Satisfaction {
    /// Every dependency is initialized
    Satisfied,
    /// At least one dependency is still coming up
    Waiting,
    /// A dependency was torn down; this peer can never succeed
    Lost,
}

/// Coordinator state, owned by the coordinator task
///
/// Every mutation happens inside one dispatched request, so evaluation is
/// serialized and needs no locking.
struct Engine {
    own_origin: Option<String>,
    timeout: Duration,
    safety_check_interval: Option<Duration>,
    provider: Arc<dyn ChannelProvider>,
    coord_tx: mpsc::Sender<CoordRequest>,
    table: PeerTable,
    graph: DependencyGraph,
    metrics: CoordinatorMetrics,
}

impl Engine {
    fn new(config: &CoordinatorConfig, provider: Arc<dyn ChannelProvider>, coord_tx: mpsc::Sender<CoordRequest>) -> Self {
        let own_origin = match config.own_origin.as_deref() {
            Some(origin) => match validate_origin(origin) {
                Ok(()) => Some(origin.to_string()),
                Err(e) => {
                    warn!(error = %e, "Ignoring configured own origin");
                    None
                }
            },
            None => None,
        };

        Self {
            own_origin,
            timeout: config.timeout(),
            safety_check_interval: config.safety_check_interval(),
            provider,
            coord_tx,
            table: PeerTable::new(),
            graph: DependencyGraph::new(),
            metrics: CoordinatorMetrics::default(),
        }
    }

    fn configure(&mut self, own_origin: String, timeout: Duration) -> Result<(), CoordinatorError> {
        validate_origin(&own_origin)?;
        info!(own_origin = %own_origin, ?timeout, "Coordinator configured");
        self.own_origin = Some(own_origin);
        self.timeout = timeout;
        Ok(())
    }

    async fn register(
        &mut self,
        origin: String,
        callback: PeerCallback,
        dependencies: Vec<PeerId>,
    ) -> Result<PeerId, CoordinatorError> {
        if self.own_origin.is_none() {
            return Err(CoordinatorError::NotConfigured);
        }
        validate_origin(&origin)?;
        if self.table.has_seen_origin(&origin) {
            return Err(CoordinatorError::DuplicateOrigin { origin });
        }
        if let Some(unknown) = dependencies.iter().find(|dep| self.table.status(**dep).is_none()) {
            return Err(CoordinatorError::UnknownDependency { id: *unknown });
        }

        let id = self.table.next_id();
        let inbox = PeerInbox::new(origin.clone(), self.coord_tx.clone());
        let channel = self.provider.open(&origin, inbox).await?;

        let mut entry = PeerEntry::new(id, origin.clone(), callback, channel);
        entry.timeout = Some(arm_timeout(self.coord_tx.clone(), id, self.timeout));

        self.graph.add_peer(id, &dependencies);
        for dep in &dependencies {
            if self.table.contains(*dep) && !self.table.is_initialized(*dep) {
                self.graph.add_dependent(*dep, id);
            }
        }

        self.table.insert(entry);
        self.metrics.registered_peers += 1;
        self.metrics.active_peers = self.table.len();

        info!(peer_id = %id, origin = %origin, dependencies = ?dependencies, "Registered peer");
        Ok(id)
    }

    /// A freshly registered peer that names an already failed dependency
    fn has_lost_dependency(&self, id: PeerId) -> bool {
        self.graph
            .dependencies(id)
            .iter()
            .any(|dep| !self.table.contains(*dep))
    }

    async fn incoming(&mut self, origin: String, payload: serde_json::Value) {
        self.metrics.messages_received += 1;

        let Some(id) = self.table.id_for_origin(&origin) else {
            if self.table.has_seen_origin(&origin) {
                debug!(origin = %origin, "Dropping message from torn down peer");
            } else {
                let err = ProtocolError::UntrustedOrigin { origin };
                warn!(error = %err, "Protocol violation");
                self.metrics.protocol_violations += 1;
            }
            return;
        };

        match PeerMessage::parse(&payload) {
            Some(PeerMessage::Loaded) => self.on_loaded(id),
            Some(PeerMessage::Ready) => self.on_ready(id).await,
            None => {
                debug!(peer_id = %id, "Ignoring malformed payload");
                self.metrics.malformed_messages += 1;
            }
        }
    }

    fn on_loaded(&mut self, id: PeerId) {
        let Some(own_origin) = self.own_origin.clone() else {
            return;
        };
        let Some(entry) = self.table.get(id) else {
            return;
        };

        debug!(peer_id = %id, "Peer loaded, sending trusted origin");
        match entry.channel.send(CoordMessage::RegisterOrigin { origin: own_origin }) {
            Ok(()) => self.metrics.messages_sent += 1,
            Err(e) => {
                warn!(peer_id = %id, error = %e, "Dropped REGISTER_ORIGIN");
                self.metrics.messages_dropped += 1;
            }
        }
    }

    async fn on_ready(&mut self, id: PeerId) {
        let Some(entry) = self.table.get_mut(id) else {
            return;
        };
        if entry.initialized {
            debug!(peer_id = %id, "Duplicate READY from initialized peer");
            return;
        }

        debug!(peer_id = %id, "Peer ready");
        entry.ready = true;
        self.settle(id).await;
    }

    fn satisfaction(&self, id: PeerId) -> Satisfaction {
        let mut result = Satisfaction::Satisfied;
        for dep in self.graph.dependencies(id) {
            if !self.table.contains(*dep) {
                return Satisfaction::Lost;
            }
            if !self.table.is_initialized(*dep) {
                result = Satisfaction::Waiting;
            }
        }
        result
    }

    /// Evaluate `start` and walk the completion cascade breadth-first
    ///
    /// Idempotent: peers that are not ready, already initialized or already
    /// gone are skipped, so any number of evaluations of the same peer is safe.
    async fn settle(&mut self, start: PeerId) {
        let mut queue = VecDeque::from([start]);
        let mut lost = Vec::new();

        while let Some(id) = queue.pop_front() {
            match self.table.get(id) {
                Some(entry) if entry.ready && !entry.initialized => {}
                _ => continue,
            }

            match self.satisfaction(id) {
                Satisfaction::Satisfied => {
                    self.initialize(id);
                    queue.extend(self.graph.dependents(id).iter().copied());
                }
                Satisfaction::Waiting => self.ensure_safety_check(id),
                Satisfaction::Lost => lost.push(id),
            }
        }

        if !lost.is_empty() {
            self.fail(lost, false).await;
        }
    }

    fn initialize(&mut self, id: PeerId) {
        let Some(entry) = self.table.get_mut(id) else {
            return;
        };

        entry.initialized = true;
        entry.cancel_timers();
        let callback = entry.callback.take();
        self.metrics.initialized_peers += 1;

        info!(peer_id = %id, origin = %entry.origin, "Peer initialized");
        if let Some(callback) = callback {
            callback.invoke(true, id);
        }
    }

    fn ensure_safety_check(&mut self, id: PeerId) {
        let Some(every) = self.safety_check_interval else {
            return;
        };
        let Some(entry) = self.table.get_mut(id) else {
            return;
        };
        if entry.safety_check.is_none() {
            debug!(peer_id = %id, "Waiting on dependencies, arming safety check");
            entry.safety_check = Some(arm_safety_check(self.coord_tx.clone(), id, every));
        }
    }

    /// Fail `roots` and every transitive dependent, each exactly once
    ///
    /// A peer is removed and reported before its own dependents are visited.
    async fn fail(&mut self, roots: Vec<PeerId>, timed_out: bool) {
        let mut queue: VecDeque<(PeerId, bool)> = roots.into_iter().map(|id| (id, false)).collect();

        while let Some((id, cascaded)) = queue.pop_front() {
            match self.table.get(id) {
                None => continue,
                Some(entry) if entry.initialized => {
                    warn!(peer_id = %id, "Refusing to fail an initialized peer");
                    continue;
                }
                Some(_) => {}
            }
            let Some(mut entry) = self.table.remove_failed(id) else {
                continue;
            };

            entry.cancel_timers();
            self.metrics.failed_peers += 1;
            self.metrics.active_peers = self.table.len();
            if cascaded {
                self.metrics.cascaded_failures += 1;
                warn!(peer_id = %id, origin = %entry.origin, "Peer failed: dependency failed");
            } else if timed_out {
                warn!(peer_id = %id, origin = %entry.origin, "Peer failed: timed out");
            } else {
                warn!(peer_id = %id, origin = %entry.origin, "Peer failed: dependency unavailable");
            }

            if let Some(callback) = entry.callback.take() {
                callback.invoke(false, id);
            }
            entry.channel.close().await;

            queue.extend(self.graph.remove(id).into_iter().map(|dependent| (dependent, true)));
        }
    }

    async fn on_timeout(&mut self, id: PeerId) {
        match self.table.get(id) {
            Some(entry) if !entry.initialized && entry.timeout.is_some() => {}
            _ => {
                debug!(peer_id = %id, "Stale timeout ignored");
                return;
            }
        }

        self.metrics.timeouts += 1;
        self.fail(vec![id], true).await;
    }

    async fn on_safety_check(&mut self, id: PeerId) {
        match self.table.get(id) {
            Some(entry) if !entry.initialized && entry.safety_check.is_some() => {}
            _ => {
                debug!(peer_id = %id, "Stale safety check ignored");
                return;
            }
        }

        self.metrics.safety_checks += 1;
        self.settle(id).await;
    }
}

/// The Coordinator brings peers up in dependency order
pub struct Coordinator {
    config: CoordinatorConfig,
    provider: Arc<dyn ChannelProvider>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration
    pub fn new(config: CoordinatorConfig, provider: Arc<dyn ChannelProvider>) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        Self {
            config,
            provider,
            tx,
            rx,
        }
    }

    /// Create a caller handle
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Spawn the coordinator task and return a handle to it
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    pub async fn run(mut self) {
        let mut engine = Engine::new(&self.config, self.provider.clone(), self.tx.clone());

        info!("Coordinator started");

        while let Some(req) = self.rx.recv().await {
            match req {
                CoordRequest::Configure {
                    own_origin,
                    timeout,
                    reply,
                } => {
                    let _ = reply.send(engine.configure(own_origin, timeout));
                }

                CoordRequest::Register {
                    origin,
                    callback,
                    dependencies,
                    reply,
                } => {
                    let result = engine.register(origin, callback, dependencies).await;
                    let doomed = match &result {
                        Ok(id) if engine.has_lost_dependency(*id) => Some(*id),
                        _ => None,
                    };
                    if let Err(e) = &result {
                        debug!(error = %e, "Registration rejected");
                    }
                    let _ = reply.send(result);

                    if let Some(id) = doomed {
                        engine.fail(vec![id], false).await;
                    }
                }

                CoordRequest::Incoming { origin, payload } => {
                    engine.incoming(origin, payload).await;
                }

                CoordRequest::Timeout { id } => {
                    engine.on_timeout(id).await;
                }

                CoordRequest::SafetyCheck { id } => {
                    engine.on_safety_check(id).await;
                }

                CoordRequest::Status { id, reply } => {
                    let _ = reply.send(engine.table.status(id));
                }

                CoordRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(engine.metrics.clone());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        info!("Coordinator stopped");
    }
}
