use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CaptureError {
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture failed: {reason}")]
    Failed { reason: String },
    #[error("visual compare failed: {reason}")]
    CompareFailed { reason: String },
}

impl CaptureError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn compare_failed(reason: impl Into<String>) -> Self {
        Self::CompareFailed {
            reason: reason.into(),
        }
    }
}
