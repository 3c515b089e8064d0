//! Ownership of live monitors: configuration, status, counters, zones and
//! the bounded per-monitor snapshot/change history.

pub mod errors;
pub mod history;
pub mod model;
pub mod state;

pub use errors::RegistryError;
pub use history::{ChangePage, ChangeQuery, History};
pub use model::{
    ChangeRecord, ConfigPatch, MonitorConfig, MonitorEntry, MonitorList, MonitorStats,
    MonitorStatus, MonitorSummary,
};
pub use state::MonitorRegistry;
