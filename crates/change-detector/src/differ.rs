use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use pagewatch_capture::{CaptureError, PageSnapshot, ScreenshotRef, VisualVerdict};
use pagewatch_core_types::{ChangeCategory, DetectionMethod, Zone};

use crate::errors::DetectorError;
use crate::hash::structure_hash;
use crate::model::{ChangeScope, ChangeSet, ChangeSummary, DetectedChange};

/// Port through which screenshot comparison is delegated to the capture
/// collaborator.
#[async_trait]
pub trait VisualComparer: Send + Sync {
    async fn compare(
        &self,
        before: &ScreenshotRef,
        after: &ScreenshotRef,
        threshold: f64,
    ) -> Result<VisualVerdict, CaptureError>;
}

/// Runs the requested comparison strategies over a snapshot pair and folds
/// the findings into one deduplicated, categorized, scored change set.
pub struct ChangeDetector {
    visual: Option<Arc<dyn VisualComparer>>,
}

impl ChangeDetector {
    pub fn new(visual: Arc<dyn VisualComparer>) -> Self {
        Self {
            visual: Some(visual),
        }
    }

    /// Detector without a visual backend; `screenshot_diff` requests are
    /// skipped with a debug log.
    pub fn without_visual() -> Self {
        Self { visual: None }
    }

    pub async fn compare(
        &self,
        base: &PageSnapshot,
        current: &PageSnapshot,
        methods: &[DetectionMethod],
        zones: &[Zone],
        threshold: f64,
    ) -> Result<ChangeSet, DetectorError> {
        // Expansion through a sorted set makes the run order-insensitive and
        // collapses hybrid overlap with explicitly requested strategies.
        let mut expanded: BTreeSet<DetectionMethod> = BTreeSet::new();
        for method in methods {
            expanded.extend(method.expand().iter().copied());
        }

        let mut changes = Vec::new();
        for method in expanded {
            match method {
                DetectionMethod::ContentHash => {
                    collect_content_hash(base, current, zones, &mut changes)
                }
                DetectionMethod::DomDiff => collect_dom_diff(base, current, &mut changes),
                DetectionMethod::TextDiff => collect_text_diff(base, current, &mut changes),
                DetectionMethod::AttributeDiff => {
                    collect_attribute_diff(base, current, &mut changes)
                }
                DetectionMethod::StructureDiff => {
                    collect_structure_diff(base, current, &mut changes)
                }
                DetectionMethod::ScreenshotDiff => {
                    self.collect_screenshot_diff(base, current, threshold, &mut changes)
                        .await?
                }
                DetectionMethod::Hybrid => unreachable!("hybrid expands to concrete strategies"),
            }
        }

        let changes = dedupe(changes);
        let summary = summarize(&changes);
        let significance = score(&summary);

        Ok(ChangeSet {
            base: base.id.clone(),
            current: current.id.clone(),
            compared_at: Utc::now(),
            changes,
            summary,
            significance,
        })
    }

    async fn collect_screenshot_diff(
        &self,
        base: &PageSnapshot,
        current: &PageSnapshot,
        threshold: f64,
        changes: &mut Vec<DetectedChange>,
    ) -> Result<(), DetectorError> {
        let Some(visual) = self.visual.as_ref() else {
            debug!("screenshot_diff requested but no visual backend configured; skipping");
            return Ok(());
        };
        let (Some(before), Some(after)) = (&base.screenshot, &current.screenshot) else {
            debug!(
                base = %base.id,
                current = %current.id,
                "screenshot_diff requested but a snapshot lacks a screenshot; skipping"
            );
            return Ok(());
        };

        let verdict = visual.compare(before, after, threshold).await?;
        if verdict.different {
            changes.push(
                DetectedChange::new(
                    ChangeCategory::Visual,
                    ChangeScope::Page,
                    format!(
                        "visual difference of {:.1}% (similarity {:.3})",
                        verdict.difference_percent, verdict.similarity
                    ),
                )
                .with_detail(json!({
                    "similarity": verdict.similarity,
                    "difference_percent": verdict.difference_percent,
                    "diff_image": verdict.diff_image.as_ref().map(|r| r.0.clone()),
                })),
            );
        }
        Ok(())
    }
}

fn collect_content_hash(
    base: &PageSnapshot,
    current: &PageSnapshot,
    zones: &[Zone],
    changes: &mut Vec<DetectedChange>,
) {
    if base.content_hash != current.content_hash {
        changes.push(
            DetectedChange::new(
                ChangeCategory::Content,
                ChangeScope::Page,
                "page content hash changed",
            )
            .with_detail(json!({
                "before": base.content_hash,
                "after": current.content_hash,
            })),
        );
    }

    for zone in zones {
        let before = base.zone_hashes.get(&zone.selector);
        let after = current.zone_hashes.get(&zone.selector);
        if before != after {
            changes.push(
                DetectedChange::new(
                    ChangeCategory::Content,
                    ChangeScope::Zone(zone.selector.clone()),
                    format!("content changed in zone '{}'", zone.name),
                )
                .with_detail(json!({
                    "before": before,
                    "after": after,
                })),
            );
        }
    }
}

fn collect_dom_diff(base: &PageSnapshot, current: &PageSnapshot, changes: &mut Vec<DetectedChange>) {
    let before = &base.structure;
    let after = &current.structure;

    if before.element_count != after.element_count {
        let delta = after.element_count as i64 - before.element_count as i64;
        changes.push(
            DetectedChange::new(
                ChangeCategory::Structure,
                ChangeScope::Page,
                format!("element count changed by {delta:+}"),
            )
            .with_detail(json!({
                "before": before.element_count,
                "after": after.element_count,
                "delta": delta,
            })),
        );
    }

    for kind in after.element_kinds.difference(&before.element_kinds) {
        changes.push(
            DetectedChange::new(
                ChangeCategory::Added,
                ChangeScope::Element(kind.clone()),
                format!("element type '{kind}' appeared"),
            )
            .with_detail(json!({ "kind": kind })),
        );
    }
    for kind in before.element_kinds.difference(&after.element_kinds) {
        changes.push(
            DetectedChange::new(
                ChangeCategory::Removed,
                ChangeScope::Element(kind.clone()),
                format!("element type '{kind}' disappeared"),
            )
            .with_detail(json!({ "kind": kind })),
        );
    }
}

fn collect_text_diff(base: &PageSnapshot, current: &PageSnapshot, changes: &mut Vec<DetectedChange>) {
    if base.text != current.text {
        let delta = current.text.chars().count() as i64 - base.text.chars().count() as i64;
        changes.push(
            DetectedChange::new(
                ChangeCategory::Content,
                ChangeScope::Page,
                format!("text content changed ({delta:+} chars)"),
            )
            .with_detail(json!({
                "length_before": base.text.chars().count(),
                "length_after": current.text.chars().count(),
                "delta": delta,
            })),
        );
    }
}

fn collect_attribute_diff(
    base: &PageSnapshot,
    current: &PageSnapshot,
    changes: &mut Vec<DetectedChange>,
) {
    // Pairwise alignment by stable identity; only elements present on both
    // sides are compared here, appear/disappear belongs to dom_diff.
    for (identity, before_attrs) in &base.structure.attributes {
        let Some(after_attrs) = current.structure.attributes.get(identity) else {
            continue;
        };
        if before_attrs != after_attrs {
            changes.push(
                DetectedChange::new(
                    ChangeCategory::Attribute,
                    ChangeScope::Element(identity.clone()),
                    format!("attributes changed on '{identity}'"),
                )
                .with_detail(json!({
                    "changed": attribute_delta(before_attrs, after_attrs),
                })),
            );
        }
    }
}

fn attribute_delta(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<serde_json::Value> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|key| before.get(*key) != after.get(*key))
        .map(|key| {
            json!({
                "name": key,
                "before": before.get(key),
                "after": after.get(key),
            })
        })
        .collect()
}

fn collect_structure_diff(
    base: &PageSnapshot,
    current: &PageSnapshot,
    changes: &mut Vec<DetectedChange>,
) {
    let before = structure_hash(&base.structure);
    let after = structure_hash(&current.structure);
    if before != after {
        changes.push(
            DetectedChange::new(
                ChangeCategory::Structure,
                ChangeScope::Page,
                "document structure changed",
            )
            .with_detail(json!({
                "before": before,
                "after": after,
            })),
        );
    }
}

/// Keep the first occurrence per (category, scope) key.
fn dedupe(changes: Vec<DetectedChange>) -> Vec<DetectedChange> {
    let mut seen = HashSet::new();
    changes
        .into_iter()
        .filter(|change| seen.insert(change.dedupe_key()))
        .collect()
}

fn summarize(changes: &[DetectedChange]) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    summary.total = changes.len();
    for change in changes {
        *summary.by_category.entry(change.category).or_insert(0) += 1;
    }
    for (category, count) in &summary.by_category {
        summary.fragments.push(format!("{count} {category}"));
    }
    summary
}

/// significance = min(1, Σ count × weight / 10)
fn score(summary: &ChangeSummary) -> f64 {
    let raw: f64 = summary
        .by_category
        .iter()
        .map(|(category, count)| *count as f64 * category.weight())
        .sum();
    (raw / 10.0).min(1.0)
}
