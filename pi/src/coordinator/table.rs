//! Peer state table
//!
//! Per-peer lifecycle flags, callbacks and timers, keyed by [`PeerId`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::channel::PeerChannel;
use super::timer::TimerHandle;

/// Opaque handle assigned to a peer at registration
///
/// Ids are monotonic and never reused for the lifetime of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u64);

impl PeerId {
    /// Wrap a raw id (ids from a live coordinator come from `register`)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Underlying counter value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Peer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// Registered, channel requested, READY not yet received
    Pending,
    /// READY received, waiting on dependencies
    Ready,
    /// Terminal success
    Initialized,
    /// Terminal failure (timeout or cascaded dependency failure)
    Failed,
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Initialized => write!(f, "initialized"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Caller-supplied completion callback, invoked with `(success, id)`
///
/// Consumed on invocation, so a peer can only ever be reported once.
pub struct PeerCallback(Box<dyn FnOnce(bool, PeerId) + Send + 'static>);

impl PeerCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(bool, PeerId) + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn invoke(self, success: bool, id: PeerId) {
        (self.0)(success, id)
    }
}

impl std::fmt::Debug for PeerCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PeerCallback")
    }
}

/// Bookkeeping for one registered peer
pub struct PeerEntry {
    pub id: PeerId,
    pub origin: String,
    pub ready: bool,
    pub initialized: bool,
    pub callback: Option<PeerCallback>,
    pub timeout: Option<TimerHandle>,
    pub safety_check: Option<TimerHandle>,
    pub channel: Box<dyn PeerChannel>,
}

impl PeerEntry {
    pub fn new(id: PeerId, origin: String, callback: PeerCallback, channel: Box<dyn PeerChannel>) -> Self {
        Self {
            id,
            origin,
            ready: false,
            initialized: false,
            callback: Some(callback),
            timeout: None,
            safety_check: None,
            channel,
        }
    }

    pub fn status(&self) -> PeerStatus {
        if self.initialized {
            PeerStatus::Initialized
        } else if self.ready {
            PeerStatus::Ready
        } else {
            PeerStatus::Pending
        }
    }

    /// Cancel both timers; safe to call more than once
    pub fn cancel_timers(&mut self) {
        if let Some(timer) = self.timeout.take() {
            timer.cancel();
        }
        if let Some(timer) = self.safety_check.take() {
            timer.cancel();
        }
    }
}

/// All peers known to the coordinator
#[derive(Default)]
pub struct PeerTable {
    entries: HashMap<PeerId, PeerEntry>,
    by_origin: HashMap<String, PeerId>,
    /// Every origin ever registered; duplicates stay rejected after teardown
    seen_origins: HashSet<String>,
    failed: HashSet<PeerId>,
    last_id: u64,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id without creating an entry
    pub fn next_id(&mut self) -> PeerId {
        self.last_id += 1;
        PeerId(self.last_id)
    }

    pub fn has_seen_origin(&self, origin: &str) -> bool {
        self.seen_origins.contains(origin)
    }

    pub fn insert(&mut self, entry: PeerEntry) {
        debug!(peer_id = %entry.id, origin = %entry.origin, "PeerTable::insert: called");
        self.seen_origins.insert(entry.origin.clone());
        self.by_origin.insert(entry.origin.clone(), entry.id);
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: PeerId) -> Option<&PeerEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut PeerEntry> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Resolve an active origin to its peer
    pub fn id_for_origin(&self, origin: &str) -> Option<PeerId> {
        self.by_origin.get(origin).copied()
    }

    pub fn is_initialized(&self, id: PeerId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.initialized)
    }

    /// Remove a peer for good and remember it as failed
    pub fn remove_failed(&mut self, id: PeerId) -> Option<PeerEntry> {
        let entry = self.entries.remove(&id)?;
        self.by_origin.remove(&entry.origin);
        self.failed.insert(id);
        Some(entry)
    }

    pub fn status(&self, id: PeerId) -> Option<PeerStatus> {
        match self.entries.get(&id) {
            Some(entry) => Some(entry.status()),
            None if self.failed.contains(&id) => Some(PeerStatus::Failed),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
