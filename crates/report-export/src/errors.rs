use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),
    #[error("export serialization failed: {0}")]
    Serialize(String),
    #[error("export I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
