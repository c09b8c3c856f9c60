//! peerinit - dependency-ordered bring-up of cross-origin peers
//!
//! A single [`Coordinator`] per process brings up a set of independently
//! loading peers. Each peer completes a LOADED → REGISTER_ORIGIN → READY
//! handshake, and is only reported initialized once every peer it depends on
//! is initialized. Every registered peer gets exactly one callback, success
//! or failure; a failure (timeout) cascades to all transitive dependents.
//!
//! # Modules
//!
//! - [`coordinator`] - Coordinator task, caller handle, protocol and channel boundary
//! - [`topology`] - Topology files describing peers and their dependencies
//! - [`sim`] - Simulated bring-up of a topology over in-process channels
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod sim;
pub mod topology;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{
    ChannelProvider, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, CoordinatorMetrics,
    MpscChannelProvider, PeerChannel, PeerEndpoint, PeerId, PeerInbox, PeerMessage, PeerOutcome, PeerStatus,
};
pub use sim::{PeerReport, RunReport, run_topology};
pub use topology::{PeerSpec, Topology, TopologyError};
