use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tracing::debug;

use pagewatch_capture::PageSnapshot;
use pagewatch_registry::ChangeRecord;

use crate::errors::ExportError;
use crate::model::{ExportFormat, ExportOptions, ExportOutcome, Report};

/// Render a report and either return it inline or write it to a file.
///
/// The payload is always rendered to completion in memory first; a failing
/// write never leaves a partially rendered report behind.
pub fn export(report: Report<'_>, options: &ExportOptions) -> Result<ExportOutcome, ExportError> {
    let payload = match options.format {
        ExportFormat::Json => render_json(&report, options)?,
        ExportFormat::Csv => render_csv(&report)?,
        ExportFormat::Html => render_html(&report),
        ExportFormat::Markdown => render_markdown(&report),
    };

    match &options.file_path {
        Some(path) => {
            let path = resolve_path(path.clone(), options.format);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&path, payload.as_bytes())?;
            debug!(monitor = %report.monitor.id, path = %path.display(), "report written");
            Ok(ExportOutcome {
                format: options.format,
                payload: None,
                written_to: Some(path),
            })
        }
        None => Ok(ExportOutcome {
            format: options.format,
            payload: Some(payload),
            written_to: None,
        }),
    }
}

/// Append the format's extension when the path has none.
fn resolve_path(mut path: PathBuf, format: ExportFormat) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    path
}

fn render_json(report: &Report<'_>, options: &ExportOptions) -> Result<String, ExportError> {
    let monitor = report.monitor;
    let records: Vec<&ChangeRecord> = monitor.history.records().collect();

    let mut payload = json!({
        "monitor": {
            "id": monitor.id,
            "target": monitor.target,
            "status": monitor.status,
            "config": monitor.config,
            "created_at": monitor.created_at,
            "last_check_at": monitor.last_check_at,
            "last_change_at": monitor.last_change_at,
            "check_count": monitor.check_count,
            "change_count": monitor.change_count,
            "last_error": monitor.last_error,
        },
        "statistics": report.stats,
        "changes": records,
    });

    if options.include_snapshots {
        let snapshots: Vec<PageSnapshot> = monitor
            .history
            .snapshots()
            .map(|snapshot| {
                let mut snapshot = snapshot.clone();
                if !options.include_screenshots {
                    snapshot.screenshot = None;
                }
                snapshot
            })
            .collect();
        payload["snapshots"] = serde_json::to_value(&snapshots)
            .map_err(|err| ExportError::Serialize(err.to_string()))?;
    }

    serde_json::to_string_pretty(&payload).map_err(|err| ExportError::Serialize(err.to_string()))
}

/// One row per change record: timestamp, categories, description,
/// significance, compared snapshot pair.
fn render_csv(report: &Report<'_>) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["timestamp", "categories", "description", "significance", "snapshots"])
        .map_err(|err| ExportError::Serialize(err.to_string()))?;

    for record in report.monitor.history.records() {
        let categories = record
            .categories()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("|");
        writer
            .write_record([
                record.timestamp.to_rfc3339(),
                categories,
                record.summary.describe(),
                format!("{:.3}", record.significance),
                format!("{}..{}", record.base_snapshot, record.current_snapshot),
            ])
            .map_err(|err| ExportError::Serialize(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Serialize(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Serialize(err.to_string()))
}

fn render_html(report: &Report<'_>) -> String {
    let monitor = report.monitor;
    let stats = report.stats;
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str(&format!(
        "<title>Change report: {}</title>\n",
        escape_html(&monitor.target)
    ));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!(
        "<h1>Change report: {}</h1>\n",
        escape_html(&monitor.target)
    ));
    out.push_str("<ul>\n");
    out.push_str(&format!("<li>Status: {}</li>\n", monitor.status.as_str()));
    out.push_str(&format!("<li>Checks: {}</li>\n", stats.check_count));
    out.push_str(&format!("<li>Changes: {}</li>\n", stats.change_count));
    out.push_str(&format!(
        "<li>Average check duration: {:.1} ms</li>\n",
        stats.avg_check_ms
    ));
    out.push_str("</ul>\n");

    out.push_str("<h2>Timeline</h2>\n<table border=\"1\">\n");
    out.push_str(
        "<tr><th>Timestamp</th><th>Categories</th><th>Description</th><th>Significance</th></tr>\n",
    );
    for record in monitor.history.records() {
        let categories = record
            .categories()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.3}</td></tr>\n",
            record.timestamp.to_rfc3339(),
            escape_html(&categories),
            escape_html(&record.summary.describe()),
            record.significance,
        ));
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn render_markdown(report: &Report<'_>) -> String {
    let monitor = report.monitor;
    let stats = report.stats;
    let mut out = String::new();
    out.push_str(&format!("# Change report: {}\n\n", monitor.target));
    out.push_str(&format!("- Status: {}\n", monitor.status.as_str()));
    out.push_str(&format!("- Checks: {}\n", stats.check_count));
    out.push_str(&format!("- Changes: {}\n", stats.change_count));
    out.push_str(&format!(
        "- Average check duration: {:.1} ms\n\n",
        stats.avg_check_ms
    ));

    out.push_str("## Timeline\n\n");
    if monitor.history.record_count() == 0 {
        out.push_str("No changes recorded.\n");
        return out;
    }
    for record in monitor.history.records() {
        let categories = record
            .categories()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "- **{}** [{}] significance {:.3}: {}\n",
            record.timestamp.to_rfc3339(),
            categories,
            record.significance,
            record.summary.describe(),
        ));
    }
    out
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
