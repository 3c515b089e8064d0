//! End-to-end scenarios driving the engine through a scripted capture
//! collaborator.

use std::sync::Arc;
use std::time::Duration;

use pagewatch::{
    ChangeCategory, ChangeQuery, ChangeScope, ConfigPatch, DetectionMethod, Engine, EngineConfig,
    EngineError, ExportFormat, ExportOptions, MonitorConfig, MonitorStatus, PageSnapshot,
    RegistryError, ScriptedCapture, StartRequest, StructureSummary, WatchEvent, Zone,
};

fn structure(count: usize, kinds: &[&str]) -> StructureSummary {
    let mut summary = StructureSummary::default();
    summary.element_count = count;
    summary.element_kinds = kinds.iter().map(|k| k.to_string()).collect();
    summary
}

fn snapshot(hash: &str, text: &str) -> PageSnapshot {
    PageSnapshot::new(hash)
        .with_text(text)
        .with_structure(structure(3, &["div", "p"]))
}

fn manual_config() -> MonitorConfig {
    MonitorConfig {
        methods: vec![DetectionMethod::Hybrid],
        interval: Duration::ZERO,
        ..Default::default()
    }
}

async fn engine_with_monitor(
    config: MonitorConfig,
) -> (Engine, Arc<ScriptedCapture>, pagewatch::MonitorId) {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(snapshot("h1", "hello world"));
    let engine = Engine::new(capture.clone(), EngineConfig::default());
    let started = engine
        .start(StartRequest::new("https://example.com", config))
        .await
        .expect("start");
    (engine, capture, started.monitor.id)
}

#[tokio::test]
async fn scenario_a_identical_snapshot_reports_no_changes() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    capture.push_snapshot(snapshot("h1", "hello world"));

    let outcome = engine.check_now(&id).await.unwrap();
    assert!(!outcome.has_changes);
    assert!(outcome.changes.is_empty());
    assert_eq!(outcome.stats.check_count, 1);
}

#[tokio::test]
async fn scenario_b_hash_change_yields_one_page_content_change() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    // Same structure and text, different page hash.
    capture.push_snapshot(snapshot("h2", "hello world"));

    let outcome = engine.check_now(&id).await.unwrap();
    assert!(outcome.has_changes);
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].category, ChangeCategory::Content);
    assert_eq!(outcome.changes[0].scope, ChangeScope::Page);
    assert!(outcome.significance > 0.0 && outcome.significance <= 1.0);
}

#[tokio::test]
async fn scenario_c_history_is_bounded_to_most_recent() {
    let mut config = manual_config();
    config.max_history_size = 3;
    let (engine, capture, id) = engine_with_monitor(config).await;

    for i in 1..=5 {
        capture.push_snapshot(snapshot(&format!("hash-{i}"), "hello world"));
        let outcome = engine.check_now(&id).await.unwrap();
        assert!(outcome.has_changes, "check {i}");
    }

    let page = engine.get_changes(&id, &ChangeQuery::default()).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.records.len(), 3);
    assert!(!page.has_more);
    // Most recent entries, oldest first.
    let timestamps: Vec<_> = page.records.iter().map(|r| r.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));

    let stats = engine.get_stats(&id).unwrap();
    assert_eq!(stats.change_count, 5);
    assert_eq!(stats.records_retained, 3);
}

#[tokio::test]
async fn scenario_d_csv_export_has_header_and_five_columns() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    for i in 1..=4 {
        capture.push_snapshot(snapshot(&format!("hash-{i}"), "hello world"));
        engine.check_now(&id).await.unwrap();
    }

    let outcome = engine
        .export(&id, &ExportOptions::new(ExportFormat::Csv))
        .unwrap();
    let payload = outcome.payload.unwrap();
    let lines: Vec<&str> = payload.lines().collect();
    assert_eq!(lines.len(), 5, "1 header + 4 data rows");
    let rows = csv_rows(&payload);
    assert!(rows.iter().all(|row| row.len() == 5));
}

fn csv_rows(payload: &str) -> Vec<Vec<String>> {
    payload
        .lines()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn export_to_file_creates_the_report_on_disk() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    capture.push_snapshot(snapshot("h2", "hello world"));
    engine.check_now(&id).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions::new(ExportFormat::Markdown).to_file(dir.path().join("report"));
    let outcome = engine.export(&id, &options).unwrap();

    assert!(outcome.payload.is_none());
    let written = outcome.written_to.unwrap();
    assert_eq!(written.extension().unwrap(), "md");
    let content = std::fs::read_to_string(&written).unwrap();
    assert!(content.contains("https://example.com"));
}

#[tokio::test]
async fn scenario_e_stopped_monitor_rejects_checks_but_keeps_history() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    capture.push_snapshot(snapshot("h2", "hello world"));
    engine.check_now(&id).await.unwrap();

    engine.stop(&id).unwrap();

    let err = engine.check_now(&id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Registry(RegistryError::MonitorStopped(_))
    ));

    let page = engine.get_changes(&id, &ChangeQuery::default()).unwrap();
    assert_eq!(page.total, 1);

    // Terminal: every lifecycle mutation is rejected.
    assert!(engine.pause(&id).is_err());
    assert!(engine.resume(&id).is_err());
    assert!(engine
        .configure(&id, ConfigPatch::default())
        .is_err());
}

#[tokio::test]
async fn pause_and_resume_preserve_counters_and_history() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    capture.push_snapshot(snapshot("h2", "hello world"));
    engine.check_now(&id).await.unwrap();

    let before = engine.get_stats(&id).unwrap();
    engine.pause(&id).unwrap();
    engine.resume(&id).unwrap();
    let after = engine.get_stats(&id).unwrap();

    assert_eq!(before.check_count, after.check_count);
    assert_eq!(before.change_count, after.change_count);
    assert_eq!(before.records_retained, after.records_retained);

    // Subsequent checks append rather than reset.
    capture.push_snapshot(snapshot("h3", "hello world"));
    engine.check_now(&id).await.unwrap();
    let stats = engine.get_stats(&id).unwrap();
    assert_eq!(stats.check_count, before.check_count + 1);
    assert_eq!(stats.change_count, before.change_count + 1);
}

#[tokio::test]
async fn duplicate_zone_is_rejected_and_list_unchanged() {
    let (engine, _capture, id) = engine_with_monitor(manual_config()).await;
    engine.add_zone(&id, Zone::new("#prices", "Prices")).unwrap();

    let err = engine
        .add_zone(&id, Zone::new("#prices", "Prices again"))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Registry(RegistryError::DuplicateZone { .. })
    ));
}

#[tokio::test]
async fn capture_failure_marks_error_and_retry_clears_it() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    // Nothing queued: the next capture fails.
    let err = engine.check_now(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::Capture(_)));

    let stats = engine.get_stats(&id).unwrap();
    assert_eq!(stats.status, MonitorStatus::Error);
    assert!(stats.last_error.is_some());
    // Failed checks never touch history or counters.
    assert_eq!(stats.check_count, 0);

    capture.push_snapshot(snapshot("h1", "hello world"));
    let outcome = engine.check_now(&id).await.unwrap();
    assert!(!outcome.has_changes);
    assert_eq!(outcome.stats.status, MonitorStatus::Active);
    assert!(outcome.stats.last_error.is_none());
}

#[tokio::test]
async fn repeated_failures_auto_pause_with_distinct_event() {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(snapshot("h1", "hello world"));
    let engine = Engine::new(
        capture.clone(),
        EngineConfig {
            max_consecutive_failures: 2,
            ..Default::default()
        },
    );
    let started = engine
        .start(StartRequest::new("https://example.com", manual_config()))
        .await
        .unwrap();
    let id = started.monitor.id;
    let mut events = engine.subscribe();

    engine.check_now(&id).await.unwrap_err();
    engine.check_now(&id).await.unwrap_err();

    let stats = engine.get_stats(&id).unwrap();
    assert_eq!(stats.status, MonitorStatus::Paused);

    let event = events.try_recv().unwrap();
    match event {
        WatchEvent::MonitorAutoPaused {
            monitor,
            consecutive_failures,
            ..
        } => {
            assert_eq!(monitor, id);
            assert_eq!(consecutive_failures, 2);
        }
        other => panic!("expected auto-pause event, got {other:?}"),
    }
}

#[tokio::test]
async fn change_notification_carries_the_record() {
    let (engine, capture, id) = engine_with_monitor(manual_config()).await;
    let mut events = engine.subscribe();

    capture.push_snapshot(snapshot("h2", "hello world"));
    let outcome = engine.check_now(&id).await.unwrap();
    assert!(outcome.has_changes);

    match events.try_recv().unwrap() {
        WatchEvent::ChangeDetected {
            monitor,
            target,
            record,
            ..
        } => {
            assert_eq!(monitor, id);
            assert_eq!(target, "https://example.com");
            assert_eq!(record.summary.total, 1);
        }
        other => panic!("expected change event, got {other:?}"),
    }
}

#[tokio::test]
async fn compare_versions_works_on_non_adjacent_snapshots() {
    let mut config = manual_config();
    config.max_history_size = 10;
    let (engine, capture, id) = engine_with_monitor(config).await;

    capture.push_snapshot(snapshot("h2", "hello world"));
    engine.check_now(&id).await.unwrap();
    capture.push_snapshot(snapshot("h3", "hello world"));
    engine.check_now(&id).await.unwrap();

    let page = engine.get_changes(&id, &ChangeQuery::default()).unwrap();
    // Compare the very first and the very last snapshot.
    let first = page.records.first().unwrap().base_snapshot.clone();
    let last = page.records.last().unwrap().current_snapshot.clone();

    let set = engine.compare_versions(&id, &first, &last).await.unwrap();
    assert!(set.has_changes());

    let unknown = pagewatch::SnapshotId::new();
    let err = engine.compare_versions(&id, &first, &unknown).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Registry(RegistryError::SnapshotNotFound(_))
    ));
}

#[tokio::test]
async fn target_mismatch_is_rejected_before_any_mutation() {
    let capture = Arc::new(ScriptedCapture::new());
    let engine = Engine::new(capture.clone(), EngineConfig::default());

    let err = engine
        .start(
            StartRequest::new("https://example.com", manual_config())
                .inspecting("https://other.example"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TargetMismatch { .. }));
    assert_eq!(engine.list().total, 0);
    // The capture collaborator was never asked for a snapshot.
    assert_eq!(capture.capture_requests().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduled_monitor_checks_periodically() {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(snapshot("h1", "hello world"));
    for i in 2..=10 {
        capture.push_snapshot(snapshot(&format!("h{i}"), "hello world"));
    }
    let engine = Engine::new(capture.clone(), EngineConfig::default());
    let mut config = manual_config();
    config.interval = Duration::from_millis(50);
    let started = engine
        .start(StartRequest::new("https://example.com", config))
        .await
        .unwrap();
    let id = started.monitor.id;

    let schedule = engine.get_schedule(&id).unwrap().expect("scheduled");
    assert!(schedule.running);
    assert_eq!(schedule.interval, Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(180)).await;
    let stats = engine.get_stats(&id).unwrap();
    assert!(stats.check_count >= 3, "got {}", stats.check_count);
    assert!(stats.change_count >= 3);

    engine.pause(&id).unwrap();
    tokio::task::yield_now().await;
    let paused_count = engine.get_stats(&id).unwrap().check_count;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.get_stats(&id).unwrap().check_count, paused_count);
}

#[tokio::test(start_paused = true)]
async fn interval_reconfigure_during_error_keeps_the_schedule() {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(snapshot("h1", "hello world"));
    let engine = Engine::new(capture.clone(), EngineConfig::default());
    let mut config = manual_config();
    config.interval = Duration::from_millis(100);
    let started = engine
        .start(StartRequest::new("https://example.com", config))
        .await
        .unwrap();
    let id = started.monitor.id;

    // First tick has nothing queued, so the capture fails.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(engine.get_stats(&id).unwrap().status, MonitorStatus::Error);

    engine
        .configure(
            &id,
            ConfigPatch {
                interval: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(engine.get_schedule(&id).unwrap().is_some());

    for i in 2..=6 {
        capture.push_snapshot(snapshot(&format!("h{i}"), "hello world"));
    }
    tokio::time::sleep(Duration::from_millis(220)).await;

    // The new cadence ran checks and a success cleared the error.
    let stats = engine.get_stats(&id).unwrap();
    assert_eq!(stats.status, MonitorStatus::Active);
    assert!(stats.check_count >= 1, "got {}", stats.check_count);
    assert!(stats.last_error.is_none());
    assert!(engine.get_schedule(&id).unwrap().is_some());
}

#[tokio::test]
async fn list_reflects_monitor_states() {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(snapshot("a1", "a"));
    capture.push_snapshot(snapshot("b1", "b"));
    let engine = Engine::new(capture.clone(), EngineConfig::default());

    let a = engine
        .start(StartRequest::new("https://a.example", manual_config()))
        .await
        .unwrap();
    let _b = engine
        .start(StartRequest::new("https://b.example", manual_config()))
        .await
        .unwrap();

    engine.pause(&a.monitor.id).unwrap();
    let list = engine.list();
    assert_eq!(list.total, 2);
    assert_eq!(list.active, 1);
    assert_eq!(list.paused, 1);
}

#[tokio::test]
async fn screenshot_method_emits_visual_change_via_collaborator() {
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_snapshot(
        snapshot("h1", "hello").with_screenshot(pagewatch::ScreenshotRef("shot-1".into())),
    );
    let engine = Engine::new(capture.clone(), EngineConfig::default());

    let mut config = manual_config();
    config.methods = vec![DetectionMethod::ScreenshotDiff];
    config.capture_screenshots = true;
    let started = engine
        .start(StartRequest::new("https://example.com", config))
        .await
        .unwrap();
    let id = started.monitor.id;

    capture.push_snapshot(
        snapshot("h1", "hello").with_screenshot(pagewatch::ScreenshotRef("shot-2".into())),
    );
    capture.push_verdict(pagewatch::VisualVerdict {
        different: true,
        similarity: 0.4,
        difference_percent: 42.0,
        diff_image: None,
    });

    let outcome = engine.check_now(&id).await.unwrap();
    assert!(outcome.has_changes);
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].category, ChangeCategory::Visual);
    assert_eq!(capture.compare_requests().len(), 1);
}
