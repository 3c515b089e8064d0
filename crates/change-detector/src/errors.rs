use thiserror::Error;

use pagewatch_capture::CaptureError;

#[derive(Debug, Error)]
pub enum DetectorError {
    /// The delegated visual comparison failed at the collaborator.
    #[error("visual comparison failed: {0}")]
    Visual(#[from] CaptureError),
}
