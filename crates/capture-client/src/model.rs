use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pagewatch_core_types::{DetectionMethod, SnapshotId, Zone};

/// Correlates a request with its eventual response at the collaborator.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a screenshot held by the capture collaborator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRef(pub String);

/// Order-independent structural summary of the observed document.
///
/// Attribute maps are keyed by a stable element identity (id when present,
/// selector path otherwise) so pairwise alignment across snapshots does not
/// depend on traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub element_count: usize,
    pub element_kinds: BTreeSet<String>,
    pub attributes: BTreeMap<String, BTreeMap<String, String>>,
}

/// Point-in-time observation of a document. Immutable once captured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub id: SnapshotId,
    pub captured_at: DateTime<Utc>,
    pub content_hash: String,
    /// Per-zone content hashes keyed by zone selector.
    #[serde(default)]
    pub zone_hashes: BTreeMap<String, String>,
    pub structure: StructureSummary,
    pub text: String,
    #[serde(default)]
    pub screenshot: Option<ScreenshotRef>,
}

impl PageSnapshot {
    pub fn new(content_hash: impl Into<String>) -> Self {
        Self {
            id: SnapshotId::new(),
            captured_at: Utc::now(),
            content_hash: content_hash.into(),
            zone_hashes: BTreeMap::new(),
            structure: StructureSummary::default(),
            text: String::new(),
            screenshot: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_structure(mut self, structure: StructureSummary) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_zone_hash(mut self, selector: impl Into<String>, hash: impl Into<String>) -> Self {
        self.zone_hashes.insert(selector.into(), hash.into());
        self
    }

    pub fn with_screenshot(mut self, shot: ScreenshotRef) -> Self {
        self.screenshot = Some(shot);
        self
    }
}

/// Capture request forwarded to the collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub correlation: CorrelationId,
    /// Address of the observed document.
    pub target: String,
    pub methods: Vec<DetectionMethod>,
    #[serde(default)]
    pub zones: Vec<Zone>,
    pub capture_screenshot: bool,
    /// Method-specific options passed through untouched.
    #[serde(default)]
    pub options: serde_json::Value,
}

impl CaptureRequest {
    pub fn new(target: impl Into<String>, methods: Vec<DetectionMethod>) -> Self {
        Self {
            correlation: CorrelationId::new(),
            target: target.into(),
            methods,
            zones: Vec::new(),
            capture_screenshot: false,
            options: serde_json::Value::Null,
        }
    }
}

/// Visual comparison request delegated to the collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisualCompareRequest {
    pub correlation: CorrelationId,
    pub before: ScreenshotRef,
    pub after: ScreenshotRef,
    pub threshold: f64,
}

/// Collaborator verdict on a pair of screenshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualVerdict {
    pub different: bool,
    pub similarity: f64,
    pub difference_percent: f64,
    #[serde(default)]
    pub diff_image: Option<ScreenshotRef>,
}
