use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use pagewatch_capture::{CaptureClient, CaptureRequest, PageSnapshot};
use pagewatch_core_types::MonitorId;
use pagewatch_detector::{ChangeDetector, ChangeSet, ChangeSummary, DetectedChange};
use pagewatch_registry::{
    ChangeRecord, MonitorConfig, MonitorRegistry, MonitorStats, MonitorStatus,
};
use pagewatch_scheduler::CheckRunner;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::notify::{ChangeNotifier, WatchEvent};

/// What a completed check returns to its caller.
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    pub monitor: MonitorId,
    pub has_changes: bool,
    pub changes: Vec<DetectedChange>,
    pub summary: ChangeSummary,
    pub significance: f64,
    pub duration: Duration,
    pub record: Option<ChangeRecord>,
    pub stats: MonitorStats,
}

/// The check sequence shared by scheduled ticks and manual triggers:
/// capture, compare against the latest retained snapshot, append to
/// history, update counters, notify.
pub struct CheckPipeline {
    registry: Arc<MonitorRegistry>,
    capture: Arc<dyn CaptureClient>,
    detector: ChangeDetector,
    notifier: Arc<ChangeNotifier>,
    config: EngineConfig,
}

impl CheckPipeline {
    pub fn new(
        registry: Arc<MonitorRegistry>,
        capture: Arc<dyn CaptureClient>,
        detector: ChangeDetector,
        notifier: Arc<ChangeNotifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            capture,
            detector,
            notifier,
            config,
        }
    }

    /// Run one check. `scheduled_epoch` is set for ticks from the periodic
    /// task; a mismatch with the monitor's current epoch means the schedule
    /// was superseded and the result must be discarded.
    pub async fn check(
        &self,
        id: &MonitorId,
        scheduled_epoch: Option<u64>,
    ) -> Result<CheckOutcome, EngineError> {
        let started = Instant::now();
        let handle = self.registry.ensure_live(id)?;

        let (target, cfg, epoch) = {
            let entry = handle.read();
            (entry.target.clone(), entry.config.clone(), entry.epoch)
        };
        if let Some(expected) = scheduled_epoch {
            // Pause/stop/reschedule bump the epoch; ERROR does not, so a
            // failing monitor keeps being retried.
            if expected != epoch {
                return Err(EngineError::StaleCheck);
            }
        }

        let snapshot = match self.capture.capture(build_request(&target, &cfg)).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return Err(self.record_check_failure(id, &target, epoch, err.to_string(), err.into()))
            }
        };

        let previous = {
            let entry = handle.read();
            if entry.epoch != epoch {
                debug!(monitor = %id, "discarding late capture result");
                return Err(EngineError::StaleCheck);
            }
            entry.history.latest_snapshot().cloned()
        };

        let change_set = match previous {
            Some(ref prev) => {
                match self
                    .detector
                    .compare(prev, &snapshot, &cfg.methods, &cfg.zones, cfg.threshold)
                    .await
                {
                    Ok(set) => Some(set),
                    Err(err) => {
                        return Err(self.record_check_failure(
                            id,
                            &target,
                            epoch,
                            err.to_string(),
                            err.into(),
                        ))
                    }
                }
            }
            None => None,
        };

        let (outcome, record) = self.apply(id, &handle, epoch, snapshot, change_set, started)?;
        if let Some(record) = &record {
            if cfg.notify_on_change {
                self.notifier.publish(WatchEvent::ChangeDetected {
                    monitor: id.clone(),
                    target,
                    record: record.clone(),
                    timestamp: record.timestamp,
                });
            }
        }
        Ok(outcome)
    }

    /// Steps 4-6 of the pipeline under one write lock, with the epoch
    /// re-validated before any history mutation.
    fn apply(
        &self,
        id: &MonitorId,
        handle: &Arc<parking_lot::RwLock<pagewatch_registry::MonitorEntry>>,
        epoch: u64,
        snapshot: PageSnapshot,
        change_set: Option<ChangeSet>,
        started: Instant,
    ) -> Result<(CheckOutcome, Option<ChangeRecord>), EngineError> {
        let mut entry = handle.write();
        if entry.epoch != epoch {
            debug!(monitor = %id, "discarding check result, epoch moved");
            return Err(EngineError::StaleCheck);
        }

        entry.history.push_snapshot(snapshot);
        entry.clear_failure();

        let mut notified = None;
        let (has_changes, changes, summary, significance) = match change_set {
            Some(set) if set.has_changes() => {
                let record = ChangeRecord::from_change_set(entry.id.clone(), &set);
                notified = Some(record.clone());
                entry.record_change(record);
                info!(
                    monitor = %id,
                    total = set.summary.total,
                    significance = set.significance,
                    "changes detected"
                );
                (true, set.changes, set.summary, set.significance)
            }
            Some(set) => (false, set.changes, set.summary, set.significance),
            None => (false, Vec::new(), ChangeSummary::default(), 0.0),
        };

        let duration = started.elapsed();
        entry.record_check(duration);

        let outcome = CheckOutcome {
            monitor: id.clone(),
            has_changes,
            changes,
            summary,
            significance,
            duration,
            record: notified.clone(),
            stats: entry.stats(),
        };
        Ok((outcome, notified))
    }

    /// Record a capture or comparison failure on the monitor without
    /// touching its history, auto-pausing after too many in a row.
    fn record_check_failure(
        &self,
        id: &MonitorId,
        target: &str,
        epoch: u64,
        message: String,
        source: EngineError,
    ) -> EngineError {
        let Ok(handle) = self.registry.ensure(id) else {
            return source;
        };

        let failures = {
            let mut entry = handle.write();
            if entry.epoch != epoch {
                debug!(monitor = %id, "discarding late capture failure");
                return EngineError::StaleCheck;
            }
            entry.record_failure(&message);
            entry.consecutive_failures
        };
        warn!(monitor = %id, failures, error = %message, "check failed");

        if failures >= self.config.max_consecutive_failures {
            match self.registry.pause(id) {
                Ok(_) => {
                    info!(monitor = %id, failures, "auto-paused after repeated failures");
                    self.notifier.publish(WatchEvent::MonitorAutoPaused {
                        monitor: id.clone(),
                        target: target.to_string(),
                        consecutive_failures: failures,
                        timestamp: Utc::now(),
                    });
                }
                Err(err) => warn!(monitor = %id, %err, "auto-pause failed"),
            }
        }
        source
    }

    fn keeps_schedule_alive(&self, id: &MonitorId) -> bool {
        match self.registry.ensure(id) {
            Ok(handle) => {
                let status = handle.read().status;
                status == MonitorStatus::Active || status == MonitorStatus::Error
            }
            Err(_) => false,
        }
    }
}

fn build_request(target: &str, cfg: &MonitorConfig) -> CaptureRequest {
    let mut request = CaptureRequest::new(target, cfg.methods.clone());
    request.zones = cfg.zones.clone();
    request.capture_screenshot = cfg.capture_screenshots;
    request
}

#[async_trait]
impl CheckRunner for CheckPipeline {
    async fn run_check(&self, monitor: MonitorId, epoch: u64) -> bool {
        match self.check(&monitor, Some(epoch)).await {
            Ok(outcome) => {
                debug!(
                    monitor = %monitor,
                    has_changes = outcome.has_changes,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "scheduled check completed"
                );
                true
            }
            Err(EngineError::StaleCheck) => false,
            Err(EngineError::Registry(_)) => false,
            Err(err) => {
                debug!(monitor = %monitor, %err, "scheduled check failed");
                // A failing monitor stays scheduled until auto-pause kicks in.
                self.keeps_schedule_alive(&monitor)
            }
        }
    }
}
