use thiserror::Error;

use pagewatch_capture::CaptureError;
use pagewatch_detector::DetectorError;
use pagewatch_export::ExportError;
use pagewatch_registry::RegistryError;

/// Everything an engine operation can fail with. None of these cross the
/// boundary as panics; callers get them as values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// `start` asked for a target different from the one currently
    /// inspectable. Detected before any mutation.
    #[error("target mismatch: requested '{requested}' but '{inspectable}' is inspectable")]
    TargetMismatch {
        requested: String,
        inspectable: String,
    },
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Comparison(#[from] DetectorError),
    #[error(transparent)]
    Export(#[from] ExportError),
    /// The monitor's schedule epoch moved while the check was in flight;
    /// the result was discarded instead of being applied.
    #[error("check result discarded: monitor state changed while capture was in flight")]
    StaleCheck,
}
