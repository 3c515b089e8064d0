//! Port to the external renderer/capture collaborator.
//!
//! The engine never talks to a browser directly; it issues correlation-id
//! tagged capture and visual-compare requests through the [`CaptureClient`]
//! trait and treats anything past the configured deadline as failed.

pub mod client;
pub mod errors;
pub mod model;
pub mod scripted;

pub use client::{CaptureClient, TimeoutCapture};
pub use errors::CaptureError;
pub use model::{
    CaptureRequest, CorrelationId, PageSnapshot, ScreenshotRef, StructureSummary,
    VisualCompareRequest, VisualVerdict,
};
pub use scripted::ScriptedCapture;
