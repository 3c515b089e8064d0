//! Comparison strategies over snapshot pairs.
//!
//! Each detection method is independent and order-insensitive; the detector
//! concatenates the per-method findings, deduplicates by (category, scope),
//! buckets into the eight fixed categories and scores the result.

pub mod differ;
pub mod errors;
pub mod hash;
pub mod model;

pub use differ::{ChangeDetector, VisualComparer};
pub use errors::DetectorError;
pub use model::{ChangeScope, ChangeSet, ChangeSummary, DetectedChange};
