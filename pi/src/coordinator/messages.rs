//! Message types for the Coordinator
//!
//! Handshake messages exchanged with peers, plus the internal requests
//! processed by the coordinator task.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use super::error::CoordinatorError;
use super::table::{PeerCallback, PeerId, PeerStatus};

/// Handshake messages sent by a peer to the Coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// The peer's channel is live and can receive coordinator messages
    Loaded,

    /// The peer finished its own setup and asks to be evaluated
    Ready,
}

impl PeerMessage {
    /// Decode a raw payload, returning None for anything malformed
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(payload.clone()) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!(error = %e, "PeerMessage::parse: malformed payload");
                None
            }
        }
    }

    /// Encode for sending over a peer channel
    pub fn to_payload(self) -> serde_json::Value {
        match self {
            Self::Loaded => serde_json::json!({"type": "LOADED"}),
            Self::Ready => serde_json::json!({"type": "READY"}),
        }
    }
}

/// Messages sent to peers from the Coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordMessage {
    /// The only origin the peer should trust from now on
    RegisterOrigin { origin: String },
}

/// Terminal result for one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOutcome {
    pub id: PeerId,
    pub success: bool,
}

/// Internal requests to the Coordinator task
pub enum CoordRequest {
    /// Set the coordinator's own origin and the per-peer timeout
    Configure {
        own_origin: String,
        timeout: Duration,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Register a new peer
    Register {
        origin: String,
        callback: PeerCallback,
        dependencies: Vec<PeerId>,
        reply: oneshot::Sender<Result<PeerId, CoordinatorError>>,
    },

    /// Raw payload received from a peer channel
    Incoming { origin: String, payload: serde_json::Value },

    /// Registration timeout fired (internal)
    Timeout { id: PeerId },

    /// Safety-check tick fired (internal)
    SafetyCheck { id: PeerId },

    /// Look up a peer's lifecycle state
    Status {
        id: PeerId,
        reply: oneshot::Sender<Option<PeerStatus>>,
    },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

impl std::fmt::Debug for CoordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure { own_origin, timeout, .. } => f
                .debug_struct("Configure")
                .field("own_origin", own_origin)
                .field("timeout", timeout)
                .finish(),
            Self::Register {
                origin, dependencies, ..
            } => f
                .debug_struct("Register")
                .field("origin", origin)
                .field("dependencies", dependencies)
                .finish(),
            Self::Incoming { origin, payload } => f
                .debug_struct("Incoming")
                .field("origin", origin)
                .field("payload", payload)
                .finish(),
            Self::Timeout { id } => f.debug_struct("Timeout").field("id", id).finish(),
            Self::SafetyCheck { id } => f.debug_struct("SafetyCheck").field("id", id).finish(),
            Self::Status { id, .. } => f.debug_struct("Status").field("id", id).finish(),
            Self::GetMetrics { .. } => f.write_str("GetMetrics"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetrics {
    pub registered_peers: u64,
    pub active_peers: usize,
    pub initialized_peers: u64,
    pub failed_peers: u64,
    pub timeouts: u64,
    pub cascaded_failures: u64,
    pub protocol_violations: u64,
    pub malformed_messages: u64,
    pub safety_checks: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    /// Replies a peer could not take because its channel was full or closed
    pub messages_dropped: u64,
}
