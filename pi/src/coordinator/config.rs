//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Origin peers are told to trust; registration is refused until set
    #[serde(rename = "own-origin", default)]
    pub own_origin: Option<String>,

    /// Per-peer bring-up deadline in milliseconds, measured from registration
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Safety-check polling interval in milliseconds (0 disables polling)
    #[serde(rename = "safety-check-interval-ms", default = "default_safety_check_interval_ms")]
    pub safety_check_interval_ms: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_timeout_ms() -> u64 {
    debug!("default_timeout_ms: called");
    10_000
}

fn default_safety_check_interval_ms() -> u64 {
    debug!("default_safety_check_interval_ms: called");
    1_000
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            own_origin: None,
            timeout_ms: 10_000,
            safety_check_interval_ms: 1_000,
            channel_buffer: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Get the registration timeout as a Duration
    pub fn timeout(&self) -> Duration {
        debug!(timeout_ms = %self.timeout_ms, "CoordinatorConfig::timeout: called");
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the safety-check interval, None when polling is disabled
    pub fn safety_check_interval(&self) -> Option<Duration> {
        debug!(safety_check_interval_ms = %self.safety_check_interval_ms, "CoordinatorConfig::safety_check_interval: called");
        match self.safety_check_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Builder-style own origin setter
    pub fn with_own_origin(mut self, origin: impl Into<String>) -> Self {
        self.own_origin = Some(origin.into());
        self
    }
}
