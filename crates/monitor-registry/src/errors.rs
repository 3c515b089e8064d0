use thiserror::Error;

use pagewatch_core_types::{MonitorId, SnapshotId, ZoneId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("monitor {0} not found")]
    MonitorNotFound(MonitorId),
    #[error("monitor {0} is stopped")]
    MonitorStopped(MonitorId),
    #[error("zone with selector '{selector}' already exists")]
    DuplicateZone { selector: String },
    #[error("zone {0} not found")]
    ZoneNotFound(ZoneId),
    #[error("snapshot {0} not retained for monitor")]
    SnapshotNotFound(SnapshotId),
    #[error("cannot {action} a monitor in status {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },
}
