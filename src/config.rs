use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine-wide settings. Per-monitor behavior lives in `MonitorConfig`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for capture and visual-compare requests.
    pub capture_timeout: Duration,
    /// Capture failures in a row before a monitor is auto-paused.
    pub max_consecutive_failures: u32,
    /// Capacity of the change-notification broadcast channel.
    pub notify_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_timeout: Duration::from_secs(60),
            max_consecutive_failures: 5,
            notify_capacity: 64,
        }
    }
}
