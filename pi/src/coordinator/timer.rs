//! Timeout and safety-check timers
//!
//! Timers never touch coordinator state. They post a request back to the
//! coordinator task, which decides whether the firing still matters.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::messages::CoordRequest;
use super::table::PeerId;

/// A running timer task
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. A tick already queued is discarded by the dispatcher.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Arm the single-shot registration timeout for a peer
pub fn arm_timeout(tx: mpsc::Sender<CoordRequest>, id: PeerId, after: Duration) -> TimerHandle {
    debug!(peer_id = %id, ?after, "arm_timeout: called");
    let task = tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(CoordRequest::Timeout { id }).await;
    });
    TimerHandle { task }
}

/// Arm the recurring safety check for a peer; first tick is one interval out
pub fn arm_safety_check(tx: mpsc::Sender<CoordRequest>, id: PeerId, every: Duration) -> TimerHandle {
    debug!(peer_id = %id, ?every, "arm_safety_check: called");
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut interval = tokio::time::interval_at(start, every);
        loop {
            interval.tick().await;
            if tx.send(CoordRequest::SafetyCheck { id }).await.is_err() {
                break;
            }
        }
    });
    TimerHandle { task }
}
