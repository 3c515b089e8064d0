use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pagewatch_capture::PageSnapshot;
use pagewatch_core_types::{ChangeCategory, SnapshotId};

use crate::model::ChangeRecord;

/// Bounded per-monitor storage of snapshots and change records.
///
/// Both lists append at the back and evict from the front once the cap is
/// exceeded, so they always hold the most recent entries in chronological
/// order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct History {
    cap: usize,
    snapshots: VecDeque<PageSnapshot>,
    records: VecDeque<ChangeRecord>,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            snapshots: VecDeque::new(),
            records: VecDeque::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Shrinking the cap evicts oldest entries immediately.
    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        while self.snapshots.len() > self.cap {
            self.snapshots.pop_front();
        }
        while self.records.len() > self.cap {
            self.records.pop_front();
        }
    }

    pub fn push_snapshot(&mut self, snapshot: PageSnapshot) {
        if self.snapshots.len() == self.cap {
            if let Some(evicted) = self.snapshots.pop_front() {
                debug!(snapshot = %evicted.id, "evicted oldest snapshot");
            }
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn push_record(&mut self, record: ChangeRecord) {
        if self.records.len() == self.cap {
            if let Some(evicted) = self.records.pop_front() {
                debug!(record = %evicted.id, "evicted oldest change record");
            }
        }
        self.records.push_back(record);
    }

    pub fn latest_snapshot(&self) -> Option<&PageSnapshot> {
        self.snapshots.back()
    }

    pub fn find_snapshot(&self, id: &SnapshotId) -> Option<&PageSnapshot> {
        self.snapshots.iter().find(|snap| &snap.id == id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &PageSnapshot> {
        self.snapshots.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Filter by category presence and inclusive timestamp bounds, then
    /// paginate. `total` counts the filtered set before pagination.
    pub fn query(&self, query: &ChangeQuery) -> ChangePage {
        let filtered: Vec<&ChangeRecord> = self
            .records
            .iter()
            .filter(|record| {
                query
                    .category
                    .map_or(true, |cat| record.summary.count(cat) > 0)
            })
            .filter(|record| query.since.map_or(true, |since| record.timestamp >= since))
            .filter(|record| query.until.map_or(true, |until| record.timestamp <= until))
            .collect();

        let total = filtered.len();
        let offset = query.offset.min(total);
        let limit = query.limit.unwrap_or(usize::MAX);
        let records: Vec<ChangeRecord> = filtered
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let has_more = offset + records.len() < total;

        ChangePage {
            records,
            total,
            has_more,
        }
    }
}

/// Filter for `get_changes`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChangeQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub category: Option<ChangeCategory>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangePage {
    pub records: Vec<ChangeRecord>,
    pub total: usize,
    pub has_more: bool,
}
