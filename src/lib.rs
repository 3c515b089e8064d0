//! pagewatch: a page change-detection engine.
//!
//! Long-lived monitors observe a rendered document through an external
//! capture collaborator, diff successive snapshots with several independent
//! strategies, keep a bounded per-monitor history and export reports.
//!
//! The [`Engine`] facade exposes one operation per management action; the
//! capture collaborator is injected as a [`CaptureClient`] implementation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pagewatch::{Engine, EngineConfig, MonitorConfig, ScriptedCapture, StartRequest};
//!
//! # async fn demo() -> Result<(), pagewatch::EngineError> {
//! let capture = Arc::new(ScriptedCapture::new());
//! let engine = Engine::new(capture, EngineConfig::default());
//! let started = engine
//!     .start(StartRequest::new("https://example.com", MonitorConfig::default()))
//!     .await?;
//! let outcome = engine.check_now(&started.monitor.id).await?;
//! println!("changed: {}", outcome.has_changes);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod notify;
pub mod pipeline;

pub use config::EngineConfig;
pub use engine::{Engine, StartOutcome, StartRequest};
pub use errors::EngineError;
pub use notify::{ChangeNotifier, WatchEvent};
pub use pipeline::CheckOutcome;

pub use pagewatch_capture::{
    CaptureClient, CaptureError, CaptureRequest, PageSnapshot, ScreenshotRef, ScriptedCapture,
    StructureSummary, VisualCompareRequest, VisualVerdict,
};
pub use pagewatch_core_types::{
    ChangeCategory, ChangeRecordId, DetectionMethod, MonitorId, SnapshotId, Zone, ZoneId,
};
pub use pagewatch_detector::{ChangeScope, ChangeSet, ChangeSummary, DetectedChange};
pub use pagewatch_export::{ExportFormat, ExportOptions, ExportOutcome};
pub use pagewatch_registry::{
    ChangePage, ChangeQuery, ChangeRecord, ConfigPatch, MonitorConfig, MonitorList, MonitorStats,
    MonitorStatus, MonitorSummary, RegistryError,
};
pub use pagewatch_scheduler::ScheduleInfo;
