//! Channel provider boundary
//!
//! The coordinator does not know how a peer channel is built (iframe, worker,
//! socket). It asks a [`ChannelProvider`] to open one per registered origin and
//! hands the peer a [`PeerInbox`] for talking back.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::ChannelError;
use super::messages::{CoordMessage, CoordRequest, PeerMessage};

/// Creates channels to peer origins
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Open a channel to `origin`; the peer posts back through `inbox`
    async fn open(&self, origin: &str, inbox: PeerInbox) -> Result<Box<dyn PeerChannel>, ChannelError>;
}

/// Coordinator side of an open peer channel
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Queue a message for the peer without waiting
    ///
    /// Called from the coordinator task, so it must never block. A peer that
    /// is not draining its channel gets [`ChannelError::Full`].
    fn send(&self, msg: CoordMessage) -> Result<(), ChannelError>;

    /// Tear the channel down; later sends fail with [`ChannelError::Closed`]
    async fn close(&mut self);
}

/// Sending half given to a peer
///
/// Every payload is stamped with the origin the peer was registered under.
#[derive(Debug, Clone)]
pub struct PeerInbox {
    origin: String,
    tx: mpsc::Sender<CoordRequest>,
}

impl PeerInbox {
    pub(crate) fn new(origin: impl Into<String>, tx: mpsc::Sender<CoordRequest>) -> Self {
        Self {
            origin: origin.into(),
            tx,
        }
    }

    /// Post a raw payload to the coordinator
    pub async fn post(&self, payload: serde_json::Value) -> Result<(), ChannelError> {
        debug!(origin = %self.origin, "PeerInbox::post: called");
        self.tx
            .send(CoordRequest::Incoming {
                origin: self.origin.clone(),
                payload,
            })
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Post a handshake message
    pub async fn send(&self, msg: PeerMessage) -> Result<(), ChannelError> {
        self.post(msg.to_payload()).await
    }
}

/// Peer side of a channel opened by [`MpscChannelProvider`]
#[derive(Debug)]
pub struct PeerEndpoint {
    pub origin: String,
    pub inbox: PeerInbox,
    pub rx: mpsc::Receiver<CoordMessage>,
}

impl PeerEndpoint {
    pub async fn loaded(&self) -> Result<(), ChannelError> {
        self.inbox.send(PeerMessage::Loaded).await
    }

    pub async fn ready(&self) -> Result<(), ChannelError> {
        self.inbox.send(PeerMessage::Ready).await
    }

    /// Next message from the coordinator, None once the channel is closed
    pub async fn recv(&mut self) -> Option<CoordMessage> {
        self.rx.recv().await
    }
}

/// In-process provider built on tokio mpsc channels
///
/// Each opened channel shows up as a [`PeerEndpoint`] on the receiver returned
/// by [`MpscChannelProvider::new`].
pub struct MpscChannelProvider {
    opened_tx: mpsc::UnboundedSender<PeerEndpoint>,
    buffer: usize,
}

impl MpscChannelProvider {
    pub fn new(buffer: usize) -> (Self, mpsc::UnboundedReceiver<PeerEndpoint>) {
        debug!(%buffer, "MpscChannelProvider::new: called");
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        (
            Self {
                opened_tx,
                buffer: buffer.max(1),
            },
            opened_rx,
        )
    }
}

#[async_trait]
impl ChannelProvider for MpscChannelProvider {
    async fn open(&self, origin: &str, inbox: PeerInbox) -> Result<Box<dyn PeerChannel>, ChannelError> {
        debug!(%origin, "MpscChannelProvider::open: called");
        let (tx, rx) = mpsc::channel(self.buffer);
        let endpoint = PeerEndpoint {
            origin: origin.to_string(),
            inbox,
            rx,
        };

        self.opened_tx.send(endpoint).map_err(|_| ChannelError::Open {
            origin: origin.to_string(),
            reason: "no endpoint listener".to_string(),
        })?;

        Ok(Box::new(MpscPeerChannel {
            origin: origin.to_string(),
            tx: Some(tx),
        }))
    }
}

struct MpscPeerChannel {
    origin: String,
    tx: Option<mpsc::Sender<CoordMessage>>,
}

#[async_trait]
impl PeerChannel for MpscPeerChannel {
    fn send(&self, msg: CoordMessage) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or(ChannelError::Closed)?;
        tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full {
                origin: self.origin.clone(),
            },
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Channel that accepts and discards everything
    pub(crate) struct NullChannel;

    #[async_trait]
    impl PeerChannel for NullChannel {
        fn send(&self, _msg: CoordMessage) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[tokio::test]
    async fn test_open_surfaces_endpoint() {
        let (provider, mut opened) = MpscChannelProvider::new(4);
        let (coord_tx, mut coord_rx) = mpsc::channel(4);
        let inbox = PeerInbox::new("https://a.example.com", coord_tx);

        let channel = provider.open("https://a.example.com", inbox).await.unwrap();
        let mut endpoint = opened.recv().await.unwrap();
        assert_eq!(endpoint.origin, "https://a.example.com");

        channel
            .send(CoordMessage::RegisterOrigin {
                origin: "https://app.example.com".to_string(),
            })
            .unwrap();
        assert_eq!(
            endpoint.recv().await,
            Some(CoordMessage::RegisterOrigin {
                origin: "https://app.example.com".to_string()
            })
        );

        endpoint.ready().await.unwrap();
        match coord_rx.recv().await {
            Some(CoordRequest::Incoming { origin, payload }) => {
                assert_eq!(origin, "https://a.example.com");
                assert_eq!(PeerMessage::parse(&payload), Some(PeerMessage::Ready));
            }
            other => panic!("Unexpected request: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_send() {
        let (provider, mut opened) = MpscChannelProvider::new(4);
        let (coord_tx, _coord_rx) = mpsc::channel(4);
        let inbox = PeerInbox::new("https://a.example.com", coord_tx);

        let mut channel = provider.open("https://a.example.com", inbox).await.unwrap();
        let mut endpoint = opened.recv().await.unwrap();

        channel.close().await;
        let result = channel.send(CoordMessage::RegisterOrigin {
            origin: "https://app.example.com".to_string(),
        });
        assert_eq!(result, Err(ChannelError::Closed));
        assert!(endpoint.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_channel_rejects_without_waiting() {
        let (provider, mut opened) = MpscChannelProvider::new(1);
        let (coord_tx, _coord_rx) = mpsc::channel(4);
        let inbox = PeerInbox::new("https://a.example.com", coord_tx);

        let channel = provider.open("https://a.example.com", inbox).await.unwrap();
        let mut endpoint = opened.recv().await.unwrap();
        let msg = CoordMessage::RegisterOrigin {
            origin: "https://app.example.com".to_string(),
        };

        assert_eq!(channel.send(msg.clone()), Ok(()));
        assert_eq!(
            channel.send(msg.clone()),
            Err(ChannelError::Full {
                origin: "https://a.example.com".to_string()
            })
        );

        // Draining makes room again
        assert_eq!(endpoint.recv().await, Some(msg.clone()));
        assert_eq!(channel.send(msg), Ok(()));
    }

    #[tokio::test]
    async fn test_open_fails_without_listener() {
        let (provider, opened) = MpscChannelProvider::new(4);
        drop(opened);
        let (coord_tx, _coord_rx) = mpsc::channel(4);
        let inbox = PeerInbox::new("https://a.example.com", coord_tx);

        let result = provider.open("https://a.example.com", inbox).await;
        assert!(matches!(result, Err(ChannelError::Open { .. })));
    }
}
