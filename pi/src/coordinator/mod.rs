//! Coordinator for dependency-ordered peer bring-up
//!
//! The Coordinator owns every peer's lifecycle:
//! - **Register:** open the peer's channel and arm its timeout
//! - **Handshake:** answer LOADED with the trusted origin, evaluate on READY
//! - **Cascade:** report success to dependents in registration order, or fail
//!   every transitive dependent when a peer times out
//!
//! Each registered peer's callback fires exactly once.

mod channel;
mod config;
mod core;
mod error;
mod graph;
mod handle;
mod messages;
mod table;
mod timer;

pub use channel::{ChannelProvider, MpscChannelProvider, PeerChannel, PeerEndpoint, PeerInbox};
pub use config::CoordinatorConfig;
pub use self::core::Coordinator;
pub use error::{ChannelError, CoordinatorError, ProtocolError, validate_origin};
pub use graph::DependencyGraph;
pub use handle::CoordinatorHandle;
pub use messages::{CoordMessage, CoordRequest, CoordinatorMetrics, PeerMessage, PeerOutcome};
pub use table::{PeerCallback, PeerId, PeerStatus};
pub use timer::TimerHandle;
