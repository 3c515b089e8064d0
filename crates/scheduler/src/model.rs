use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagewatch_core_types::MonitorId;

/// Snapshot of one monitor's schedule, as returned by `get_schedule`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub monitor: MonitorId,
    pub interval: Duration,
    pub running: bool,
    pub started_at: DateTime<Utc>,
    /// Best-effort estimate of the next tick.
    pub next_fire_at: Option<DateTime<Utc>>,
}
