use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pagewatch_registry::{MonitorEntry, MonitorStats};

use crate::errors::ExportError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub include_snapshots: bool,
    pub include_screenshots: bool,
    /// When set, the report is written here instead of returned inline.
    pub file_path: Option<PathBuf>,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            include_snapshots: false,
            include_screenshots: false,
            file_path: None,
        }
    }

    pub fn to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_snapshots(mut self) -> Self {
        self.include_snapshots = true;
        self
    }

    pub fn with_screenshots(mut self) -> Self {
        self.include_screenshots = true;
        self
    }
}

/// Everything a report is rendered from. Assembled by the engine from a
/// consistent read of the monitor entry.
pub struct Report<'a> {
    pub monitor: &'a MonitorEntry,
    pub stats: &'a MonitorStats,
}

#[derive(Clone, Debug)]
pub struct ExportOutcome {
    pub format: ExportFormat,
    /// Present when no file path was given.
    pub payload: Option<String>,
    /// Final path written, extension included.
    pub written_to: Option<PathBuf>,
}
