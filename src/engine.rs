use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use pagewatch_capture::{
    CaptureClient, CaptureError, CorrelationId, ScreenshotRef, TimeoutCapture,
    VisualCompareRequest, VisualVerdict,
};
use pagewatch_core_types::{MonitorId, SnapshotId, Zone, ZoneId};
use pagewatch_detector::{ChangeDetector, ChangeSet, VisualComparer};
use pagewatch_export::{self as export, ExportOptions, ExportOutcome, Report};
use pagewatch_registry::{
    ChangePage, ChangeQuery, ConfigPatch, MonitorConfig, MonitorList, MonitorRegistry,
    MonitorStats, MonitorStatus, MonitorSummary, RegistryError,
};
use pagewatch_scheduler::{ScheduleInfo, ScheduleRuntime};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::notify::{ChangeNotifier, WatchEvent};
use crate::pipeline::{CheckOutcome, CheckPipeline};

/// Parameters for `start`.
#[derive(Clone, Debug)]
pub struct StartRequest {
    pub target: String,
    pub config: MonitorConfig,
    /// The document address the caller is currently inspecting, when known.
    /// A mismatch with `target` rejects the start before any mutation.
    pub inspectable: Option<String>,
}

impl StartRequest {
    pub fn new(target: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            target: target.into(),
            config,
            inspectable: None,
        }
    }

    pub fn inspecting(mut self, inspectable: impl Into<String>) -> Self {
        self.inspectable = Some(inspectable.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct StartOutcome {
    pub monitor: MonitorSummary,
    pub initial_snapshot: SnapshotId,
}

/// The change-detection engine. Owns the registry, the scheduler, the
/// capture port and the notifier; exposes one operation per management
/// action. Every operation returns a `Result` value, never a panic.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<MonitorRegistry>,
    capture: Arc<dyn CaptureClient>,
    pipeline: Arc<CheckPipeline>,
    scheduler: Arc<ScheduleRuntime>,
    notifier: Arc<ChangeNotifier>,
    detector: ChangeDetector,
}

impl Engine {
    pub fn new(capture: Arc<dyn CaptureClient>, config: EngineConfig) -> Self {
        let capture: Arc<dyn CaptureClient> =
            Arc::new(TimeoutCapture::new(capture, config.capture_timeout));
        let registry = Arc::new(MonitorRegistry::new());
        let notifier = Arc::new(ChangeNotifier::new(config.notify_capacity));
        let visual = Arc::new(CaptureVisual {
            capture: Arc::clone(&capture),
        });
        let pipeline = Arc::new(CheckPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&capture),
            ChangeDetector::new(Arc::clone(&visual) as Arc<dyn VisualComparer>),
            Arc::clone(&notifier),
            config.clone(),
        ));
        let scheduler = Arc::new(ScheduleRuntime::new(
            Arc::clone(&pipeline) as Arc<dyn pagewatch_scheduler::CheckRunner>
        ));
        Self {
            config,
            registry,
            capture,
            pipeline,
            scheduler,
            notifier,
            detector: ChangeDetector::new(visual),
        }
    }

    /// Observe change and auto-pause notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WatchEvent> {
        self.notifier.subscribe()
    }

    /// Validate the target, capture the initial snapshot, register an
    /// `ACTIVE` monitor seeded with it and schedule its periodic task.
    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome, EngineError> {
        if let Some(inspectable) = &request.inspectable {
            if inspectable != &request.target {
                return Err(EngineError::TargetMismatch {
                    requested: request.target,
                    inspectable: inspectable.clone(),
                });
            }
        }

        let mut capture_request = pagewatch_capture::CaptureRequest::new(
            &request.target,
            request.config.methods.clone(),
        );
        capture_request.zones = request.config.zones.clone();
        capture_request.capture_screenshot = request.config.capture_screenshots;
        let snapshot = self.capture.capture(capture_request).await?;
        let snapshot_id = snapshot.id.clone();

        let interval = request.config.interval;
        let (id, handle) = self.registry.insert(request.target, request.config);
        let (epoch, monitor) = {
            let mut entry = handle.write();
            entry.history.push_snapshot(snapshot);
            (entry.epoch, entry.summary())
        };
        self.scheduler.schedule(id.clone(), interval, epoch);
        info!(monitor = %id, ?interval, "monitor started");

        Ok(StartOutcome {
            monitor,
            initial_snapshot: snapshot_id,
        })
    }

    /// Terminal stop. The schedule is cancelled without waiting for an
    /// in-flight capture; history stays queryable.
    pub fn stop(&self, id: &MonitorId) -> Result<(), EngineError> {
        self.registry.stop(id)?;
        self.scheduler.forget(id);
        Ok(())
    }

    pub fn pause(&self, id: &MonitorId) -> Result<(), EngineError> {
        self.registry.pause(id)?;
        self.scheduler.cancel(id);
        Ok(())
    }

    pub fn resume(&self, id: &MonitorId) -> Result<(), EngineError> {
        let epoch = self.registry.resume(id)?;
        let interval = self.registry.ensure(id)?.read().config.interval;
        self.scheduler.schedule(id.clone(), interval, epoch);
        Ok(())
    }

    /// Merge a partial configuration, rescheduling when the interval
    /// changed and the monitor still has a periodic task. `ERROR` monitors
    /// keep being scheduled, so an interval change replaces their task too;
    /// without that the old task would see the bumped epoch and end.
    pub fn configure(&self, id: &MonitorId, patch: ConfigPatch) -> Result<(), EngineError> {
        let (interval_changed, status) = self.registry.configure(id, patch)?;
        let schedulable = matches!(status, MonitorStatus::Active | MonitorStatus::Error);
        if interval_changed && schedulable {
            let (interval, epoch) = {
                let handle = self.registry.ensure(id)?;
                let entry = handle.read();
                (entry.config.interval, entry.epoch)
            };
            debug!(monitor = %id, ?interval, "rescheduling after configure");
            self.scheduler.schedule(id.clone(), interval, epoch);
        }
        Ok(())
    }

    pub fn add_zone(&self, id: &MonitorId, zone: Zone) -> Result<ZoneId, EngineError> {
        Ok(self.registry.add_zone(id, zone)?)
    }

    pub fn remove_zone(&self, id: &MonitorId, zone_id: &ZoneId) -> Result<Zone, EngineError> {
        Ok(self.registry.remove_zone(id, zone_id)?)
    }

    /// Manual trigger of the shared check pipeline. Serialized against
    /// scheduled ticks for the same monitor by the non-reentrant guard.
    pub async fn check_now(&self, id: &MonitorId) -> Result<CheckOutcome, EngineError> {
        // Validate before taking the guard so a stopped monitor is rejected
        // without waiting.
        self.registry.ensure_live(id)?;
        let guard = self.scheduler.guard(id);
        let _serialized = guard.lock().await;
        self.pipeline.check(id, None).await
    }

    /// Filtered, paginated change history. Works on stopped monitors.
    pub fn get_changes(&self, id: &MonitorId, query: &ChangeQuery) -> Result<ChangePage, EngineError> {
        let handle = self.registry.ensure(id)?;
        let page = handle.read().history.query(query);
        Ok(page)
    }

    /// Re-run the detector on any two retained snapshots, regardless of
    /// chronological adjacency, with the monitor's current configuration.
    pub async fn compare_versions(
        &self,
        id: &MonitorId,
        base: &SnapshotId,
        current: &SnapshotId,
    ) -> Result<ChangeSet, EngineError> {
        let handle = self.registry.ensure(id)?;
        let (base_snap, current_snap, methods, zones, threshold) = {
            let entry = handle.read();
            let base_snap = entry
                .history
                .find_snapshot(base)
                .cloned()
                .ok_or_else(|| RegistryError::SnapshotNotFound(base.clone()))?;
            let current_snap = entry
                .history
                .find_snapshot(current)
                .cloned()
                .ok_or_else(|| RegistryError::SnapshotNotFound(current.clone()))?;
            (
                base_snap,
                current_snap,
                entry.config.methods.clone(),
                entry.config.zones.clone(),
                entry.config.threshold,
            )
        };
        Ok(self
            .detector
            .compare(&base_snap, &current_snap, &methods, &zones, threshold)
            .await?)
    }

    pub fn get_schedule(&self, id: &MonitorId) -> Result<Option<ScheduleInfo>, EngineError> {
        self.registry.ensure(id)?;
        Ok(self.scheduler.info(id))
    }

    pub fn get_stats(&self, id: &MonitorId) -> Result<MonitorStats, EngineError> {
        let handle = self.registry.ensure(id)?;
        let stats = handle.read().stats();
        Ok(stats)
    }

    pub fn list(&self) -> MonitorList {
        self.registry.list()
    }

    /// Render a report. Works on stopped monitors; never mutates state.
    pub fn export(&self, id: &MonitorId, options: &ExportOptions) -> Result<ExportOutcome, EngineError> {
        let handle = self.registry.ensure(id)?;
        let entry = handle.read().clone();
        let stats = entry.stats();
        Ok(export::export(
            Report {
                monitor: &entry,
                stats: &stats,
            },
            options,
        )?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Adapter satisfying the detector's visual port with the capture client's
/// compare operation.
struct CaptureVisual {
    capture: Arc<dyn CaptureClient>,
}

#[async_trait]
impl VisualComparer for CaptureVisual {
    async fn compare(
        &self,
        before: &ScreenshotRef,
        after: &ScreenshotRef,
        threshold: f64,
    ) -> Result<VisualVerdict, CaptureError> {
        self.capture
            .compare_visual(VisualCompareRequest {
                correlation: CorrelationId::new(),
                before: before.clone(),
                after: after.clone(),
                threshold,
            })
            .await
    }
}
