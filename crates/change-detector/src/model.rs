use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pagewatch_core_types::{ChangeCategory, SnapshotId};

/// Where in the document a change was observed.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "selector")]
pub enum ChangeScope {
    /// The whole document.
    Page,
    /// A configured zone, identified by its selector.
    Zone(String),
    /// A single element or element kind, identified by its stable identity.
    Element(String),
}

impl ChangeScope {
    /// The selector, or "page" for the whole document.
    pub fn key(&self) -> &str {
        match self {
            ChangeScope::Page => "page",
            ChangeScope::Zone(selector) | ChangeScope::Element(selector) => selector,
        }
    }
}

/// One observed difference between two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedChange {
    pub category: ChangeCategory,
    pub scope: ChangeScope,
    pub description: String,
    /// Method-specific detail (deltas, similarity scores, ...).
    #[serde(default)]
    pub detail: Value,
}

impl DetectedChange {
    pub fn new(category: ChangeCategory, scope: ChangeScope, description: impl Into<String>) -> Self {
        Self {
            category,
            scope,
            description: description.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// Two changes are duplicates only when category and the full scope
    /// (kind and selector) coincide; a zone and an element sharing a
    /// selector stay distinct.
    pub(crate) fn dedupe_key(&self) -> (ChangeCategory, ChangeScope) {
        (self.category, self.scope.clone())
    }
}

/// Counts and human fragments describing a change set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub total: usize,
    pub by_category: BTreeMap<ChangeCategory, usize>,
    pub fragments: Vec<String>,
}

impl ChangeSummary {
    pub fn describe(&self) -> String {
        if self.total == 0 {
            return "no changes detected".to_string();
        }
        format!("{} change(s): {}", self.total, self.fragments.join("; "))
    }

    pub fn count(&self, category: ChangeCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

/// Result of comparing two snapshots with a set of methods.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub base: SnapshotId,
    pub current: SnapshotId,
    pub compared_at: DateTime<Utc>,
    pub changes: Vec<DetectedChange>,
    pub summary: ChangeSummary,
    /// Normalized [0,1] estimate of how impactful the changes are.
    pub significance: f64,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
