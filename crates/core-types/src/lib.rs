use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a monitor entry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub String);

impl MonitorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a captured snapshot.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a recorded change set.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChangeRecordId(pub String);

impl ChangeRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ChangeRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a watched zone within a monitor.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Comparison strategy applied to a pair of snapshots.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ContentHash,
    DomDiff,
    TextDiff,
    AttributeDiff,
    StructureDiff,
    ScreenshotDiff,
    /// ContentHash + DomDiff + TextDiff combined.
    Hybrid,
}

impl DetectionMethod {
    /// The concrete strategies a method expands to. `Hybrid` is the only
    /// composite; every other method expands to itself.
    pub fn expand(self) -> &'static [DetectionMethod] {
        match self {
            DetectionMethod::Hybrid => &[
                DetectionMethod::ContentHash,
                DetectionMethod::DomDiff,
                DetectionMethod::TextDiff,
            ],
            DetectionMethod::ContentHash => &[DetectionMethod::ContentHash],
            DetectionMethod::DomDiff => &[DetectionMethod::DomDiff],
            DetectionMethod::TextDiff => &[DetectionMethod::TextDiff],
            DetectionMethod::AttributeDiff => &[DetectionMethod::AttributeDiff],
            DetectionMethod::StructureDiff => &[DetectionMethod::StructureDiff],
            DetectionMethod::ScreenshotDiff => &[DetectionMethod::ScreenshotDiff],
        }
    }
}

/// Bucket a detected change falls into. Fixed set of eight.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Content,
    Structure,
    Style,
    Attribute,
    Added,
    Removed,
    Modified,
    Visual,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 8] = [
        ChangeCategory::Content,
        ChangeCategory::Structure,
        ChangeCategory::Style,
        ChangeCategory::Attribute,
        ChangeCategory::Added,
        ChangeCategory::Removed,
        ChangeCategory::Modified,
        ChangeCategory::Visual,
    ];

    /// Weight used when scoring the significance of a change set.
    pub fn weight(self) -> f64 {
        match self {
            ChangeCategory::Structure => 0.8,
            ChangeCategory::Added | ChangeCategory::Removed => 0.7,
            ChangeCategory::Content => 0.6,
            ChangeCategory::Modified | ChangeCategory::Visual => 0.5,
            ChangeCategory::Attribute => 0.3,
            ChangeCategory::Style => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeCategory::Content => "content",
            ChangeCategory::Structure => "structure",
            ChangeCategory::Style => "style",
            ChangeCategory::Attribute => "attribute",
            ChangeCategory::Added => "added",
            ChangeCategory::Removed => "removed",
            ChangeCategory::Modified => "modified",
            ChangeCategory::Visual => "visual",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named sub-region of the watched document, unique by selector within
/// its monitor. Method and threshold overrides fall back to the monitor's
/// configuration when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub selector: String,
    pub name: String,
    #[serde(default)]
    pub methods: Option<Vec<DetectionMethod>>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Zone {
    pub fn new(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ZoneId::new(),
            selector: selector.into(),
            name: name.into(),
            methods: None,
            threshold: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_expands_to_three_strategies() {
        let expanded = DetectionMethod::Hybrid.expand();
        assert_eq!(
            expanded,
            &[
                DetectionMethod::ContentHash,
                DetectionMethod::DomDiff,
                DetectionMethod::TextDiff,
            ]
        );
        assert_eq!(DetectionMethod::DomDiff.expand(), &[DetectionMethod::DomDiff]);
    }

    #[test]
    fn category_weights_stay_in_unit_range() {
        for category in ChangeCategory::ALL {
            let weight = category.weight();
            assert!((0.0..=1.0).contains(&weight), "{category} weight {weight}");
        }
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(MonitorId::new(), MonitorId::new());
        assert_ne!(SnapshotId::new(), SnapshotId::new());
    }
}
