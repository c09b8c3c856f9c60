//! CoordinatorHandle - Client interface for registering peers

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::error::CoordinatorError;
use super::messages::{CoordRequest, CoordinatorMetrics, PeerOutcome};
use super::table::{PeerCallback, PeerId, PeerStatus};

/// Handle for callers to interact with the Coordinator
///
/// This handle is cloneable and can be passed wherever peers are registered.
/// Errors in `configure` and `register` come back from the same call.
#[derive(Clone)]
pub struct CoordinatorHandle {
    /// Sender to the Coordinator task
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        debug!("CoordinatorHandle::new: called");
        Self { tx }
    }

    /// Set the origin peers are told to trust, and the per-peer timeout
    pub async fn configure(&self, own_origin: &str, timeout: Duration) -> Result<(), CoordinatorError> {
        debug!(%own_origin, ?timeout, "CoordinatorHandle::configure: called");
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Configure {
                own_origin: own_origin.to_string(),
                timeout,
                reply,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Register a peer
    ///
    /// `callback` runs exactly once, on the coordinator task, with `(true, id)`
    /// once the peer and all of `dependencies` are initialized, or `(false, id)`
    /// on timeout or when a dependency fails.
    pub async fn register<F>(
        &self,
        origin: &str,
        callback: F,
        dependencies: &[PeerId],
    ) -> Result<PeerId, CoordinatorError>
    where
        F: FnOnce(bool, PeerId) + Send + 'static,
    {
        debug!(%origin, ?dependencies, "CoordinatorHandle::register: called");
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Register {
                origin: origin.to_string(),
                callback: PeerCallback::new(callback),
                dependencies: dependencies.to_vec(),
                reply,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        let id = reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)??;
        debug!(peer_id = %id, "CoordinatorHandle::register: registered");
        Ok(id)
    }

    /// Register a peer and get its terminal outcome as a future
    pub async fn register_with_outcome(
        &self,
        origin: &str,
        dependencies: &[PeerId],
    ) -> Result<(PeerId, oneshot::Receiver<PeerOutcome>), CoordinatorError> {
        debug!(%origin, "CoordinatorHandle::register_with_outcome: called");
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let id = self
            .register(
                origin,
                move |success, id| {
                    let _ = outcome_tx.send(PeerOutcome { id, success });
                },
                dependencies,
            )
            .await?;
        Ok((id, outcome_rx))
    }

    /// Hand a raw payload from an external transport to the coordinator
    ///
    /// Payloads from origins that were never registered are dropped as
    /// protocol violations; malformed payloads are ignored.
    pub async fn deliver(&self, origin: &str, payload: serde_json::Value) -> Result<(), CoordinatorError> {
        debug!(%origin, "CoordinatorHandle::deliver: called");
        self.tx
            .send(CoordRequest::Incoming {
                origin: origin.to_string(),
                payload,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Current lifecycle state of a peer, None for ids never handed out
    pub async fn status(&self, id: PeerId) -> Result<Option<PeerStatus>, CoordinatorError> {
        debug!(peer_id = %id, "CoordinatorHandle::status: called");
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Status { id, reply })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<CoordinatorMetrics, CoordinatorError> {
        debug!("CoordinatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Stop the coordinator task
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_coordinator_reports_channel_closed() {
        let (tx, rx) = mpsc::channel(10);
        drop(rx);
        let handle = CoordinatorHandle::new(tx);

        let result = handle.register("https://a.example.com", |_, _| {}, &[]).await;
        assert!(matches!(result, Err(CoordinatorError::ChannelClosed)));
        assert!(matches!(handle.metrics().await, Err(CoordinatorError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_register_sends_request() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = CoordinatorHandle::new(tx);

        let task = tokio::spawn(async move {
            handle
                .register("https://a.example.com", |_, _| {}, &[PeerId::from_raw(1)])
                .await
        });

        match rx.recv().await {
            Some(CoordRequest::Register {
                origin,
                dependencies,
                reply,
                ..
            }) => {
                assert_eq!(origin, "https://a.example.com");
                assert_eq!(dependencies, vec![PeerId::from_raw(1)]);
                reply.send(Ok(PeerId::from_raw(2))).unwrap();
            }
            other => panic!("Unexpected request: {:?}", other),
        }

        assert_eq!(task.await.unwrap().unwrap(), PeerId::from_raw(2));
    }
}
