use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagewatch_core_types::{
    ChangeCategory, ChangeRecordId, DetectionMethod, MonitorId, SnapshotId, Zone,
};
use pagewatch_detector::{ChangeSet, ChangeSummary, DetectedChange};

use crate::history::History;

/// Explicit monitor configuration. Every recognized field, with defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub methods: Vec<DetectionMethod>,
    /// Zero means manual-only: no periodic task is scheduled.
    pub interval: Duration,
    pub threshold: f64,
    #[serde(default)]
    pub zones: Vec<Zone>,
    pub notify_on_change: bool,
    pub capture_screenshots: bool,
    pub keep_history: bool,
    pub max_history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            methods: vec![DetectionMethod::ContentHash],
            interval: Duration::ZERO,
            threshold: 0.9,
            zones: Vec::new(),
            notify_on_change: true,
            capture_screenshots: false,
            keep_history: true,
            max_history_size: 50,
        }
    }
}

/// Partial configuration merge applied by `configure`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub methods: Option<Vec<DetectionMethod>>,
    #[serde(default)]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub notify_on_change: Option<bool>,
    #[serde(default)]
    pub capture_screenshots: Option<bool>,
    #[serde(default)]
    pub keep_history: Option<bool>,
    #[serde(default)]
    pub max_history_size: Option<usize>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorStatus {
    Active,
    Paused,
    /// Terminal. History remains queryable, all mutation is rejected.
    Stopped,
    Error,
}

impl MonitorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorStatus::Active => "ACTIVE",
            MonitorStatus::Paused => "PAUSED",
            MonitorStatus::Stopped => "STOPPED",
            MonitorStatus::Error => "ERROR",
        }
    }
}

/// Categorized, scored result of one comparison that found changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: ChangeRecordId,
    pub monitor: MonitorId,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<DetectedChange>,
    pub summary: ChangeSummary,
    pub significance: f64,
    pub base_snapshot: SnapshotId,
    pub current_snapshot: SnapshotId,
}

impl ChangeRecord {
    pub fn from_change_set(monitor: MonitorId, set: &ChangeSet) -> Self {
        Self {
            id: ChangeRecordId::new(),
            monitor,
            timestamp: set.compared_at,
            changes: set.changes.clone(),
            summary: set.summary.clone(),
            significance: set.significance,
            base_snapshot: set.base.clone(),
            current_snapshot: set.current.clone(),
        }
    }

    pub fn categories(&self) -> Vec<ChangeCategory> {
        self.summary.by_category.keys().copied().collect()
    }
}

/// Mutable state of one monitor. Owned by the registry behind a lock;
/// mutated only by pipeline runs and explicit lifecycle calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorEntry {
    pub id: MonitorId,
    pub target: String,
    pub config: MonitorConfig,
    pub status: MonitorStatus,
    pub created_at: DateTime<Utc>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub check_count: u64,
    pub change_count: u64,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Running mean of check durations, milliseconds.
    pub avg_check_ms: f64,
    /// Bumped on pause/stop/resume/reschedule; a pipeline run started under
    /// an older epoch must discard its result.
    pub epoch: u64,
    pub history: History,
}

impl MonitorEntry {
    pub fn new(target: impl Into<String>, config: MonitorConfig) -> Self {
        let cap = config.max_history_size;
        Self {
            id: MonitorId::new(),
            target: target.into(),
            config,
            status: MonitorStatus::Active,
            created_at: Utc::now(),
            last_check_at: None,
            last_change_at: None,
            check_count: 0,
            change_count: 0,
            last_error: None,
            consecutive_failures: 0,
            avg_check_ms: 0.0,
            epoch: 0,
            history: History::new(cap),
        }
    }

    pub fn record_check(&mut self, duration: Duration) {
        self.check_count += 1;
        self.last_check_at = Some(Utc::now());
        let ms = duration.as_secs_f64() * 1000.0;
        self.avg_check_ms += (ms - self.avg_check_ms) / self.check_count as f64;
    }

    pub fn record_change(&mut self, record: ChangeRecord) {
        self.change_count += 1;
        self.last_change_at = Some(record.timestamp);
        if self.config.keep_history {
            self.history.push_record(record);
        }
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.status = MonitorStatus::Error;
        self.last_error = Some(error.into());
        self.consecutive_failures += 1;
    }

    pub fn clear_failure(&mut self) {
        if self.status == MonitorStatus::Error {
            self.status = MonitorStatus::Active;
        }
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn summary(&self) -> MonitorSummary {
        MonitorSummary {
            id: self.id.clone(),
            target: self.target.clone(),
            status: self.status,
            interval: self.config.interval,
            methods: self.config.methods.clone(),
            zone_count: self.config.zones.len(),
            check_count: self.check_count,
            change_count: self.change_count,
            last_check_at: self.last_check_at,
            last_change_at: self.last_change_at,
            last_error: self.last_error.clone(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        let now = Utc::now();
        let uptime = (now - self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let avg_interval = self.last_check_at.filter(|_| self.check_count > 0).map(|last| {
            let span = (last - self.created_at).to_std().unwrap_or(Duration::ZERO);
            span / self.check_count as u32
        });

        let mut by_category = BTreeMap::new();
        for record in self.history.records() {
            for (category, count) in &record.summary.by_category {
                *by_category.entry(*category).or_insert(0usize) += count;
            }
        }

        MonitorStats {
            id: self.id.clone(),
            status: self.status,
            check_count: self.check_count,
            change_count: self.change_count,
            changes_by_category: by_category,
            uptime,
            avg_check_interval: avg_interval,
            avg_check_ms: self.avg_check_ms,
            snapshots_retained: self.history.snapshot_count(),
            records_retained: self.history.record_count(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Row returned by `list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub id: MonitorId,
    pub target: String,
    pub status: MonitorStatus,
    pub interval: Duration,
    pub methods: Vec<DetectionMethod>,
    pub zone_count: usize,
    pub check_count: u64,
    pub change_count: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorList {
    pub monitors: Vec<MonitorSummary>,
    pub total: usize,
    pub active: usize,
    pub paused: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorStats {
    pub id: MonitorId,
    pub status: MonitorStatus,
    pub check_count: u64,
    pub change_count: u64,
    pub changes_by_category: BTreeMap<ChangeCategory, usize>,
    pub uptime: Duration,
    pub avg_check_interval: Option<Duration>,
    pub avg_check_ms: f64,
    pub snapshots_retained: usize,
    pub records_retained: usize,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_converges() {
        let mut entry = MonitorEntry::new("https://example.com", MonitorConfig::default());
        entry.record_check(Duration::from_millis(100));
        entry.record_check(Duration::from_millis(300));
        assert!((entry.avg_check_ms - 200.0).abs() < 1e-9);
        assert_eq!(entry.check_count, 2);
    }

    #[test]
    fn failure_then_success_clears_error_state() {
        let mut entry = MonitorEntry::new("https://example.com", MonitorConfig::default());
        entry.record_failure("capture failed: boom");
        entry.record_failure("capture failed: boom");
        assert_eq!(entry.status, MonitorStatus::Error);
        assert_eq!(entry.consecutive_failures, 2);

        entry.clear_failure();
        assert_eq!(entry.status, MonitorStatus::Active);
        assert_eq!(entry.consecutive_failures, 0);
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn entry_round_trips_through_json() {
        let entry = MonitorEntry::new("https://example.com", MonitorConfig::default());
        let json = serde_json::to_string(&entry).unwrap();
        let back: MonitorEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.config, entry.config);
    }
}
