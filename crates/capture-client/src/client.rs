use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::CaptureError;
use crate::model::{CaptureRequest, PageSnapshot, VisualCompareRequest, VisualVerdict};

/// Port to the external renderer/capture collaborator.
#[async_trait]
pub trait CaptureClient: Send + Sync {
    /// Observe the target document and return a fresh snapshot.
    async fn capture(&self, request: CaptureRequest) -> Result<PageSnapshot, CaptureError>;

    /// Ask the collaborator to compare two screenshots it holds.
    async fn compare_visual(
        &self,
        request: VisualCompareRequest,
    ) -> Result<VisualVerdict, CaptureError>;
}

/// Deadline-enforcing decorator around any [`CaptureClient`].
///
/// An elapsed deadline surfaces as [`CaptureError::Timeout`]; the inner
/// future is dropped, so a response that would have arrived later never
/// reaches the pipeline.
pub struct TimeoutCapture {
    inner: Arc<dyn CaptureClient>,
    deadline: Duration,
}

impl TimeoutCapture {
    pub fn new(inner: Arc<dyn CaptureClient>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl CaptureClient for TimeoutCapture {
    async fn capture(&self, request: CaptureRequest) -> Result<PageSnapshot, CaptureError> {
        let correlation = request.correlation.clone();
        debug!(%correlation, target = %request.target, "issuing capture request");
        match tokio::time::timeout(self.deadline, self.inner.capture(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%correlation, deadline = ?self.deadline, "capture deadline elapsed");
                Err(CaptureError::Timeout(self.deadline))
            }
        }
    }

    async fn compare_visual(
        &self,
        request: VisualCompareRequest,
    ) -> Result<VisualVerdict, CaptureError> {
        let correlation = request.correlation.clone();
        match tokio::time::timeout(self.deadline, self.inner.compare_visual(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%correlation, deadline = ?self.deadline, "visual compare deadline elapsed");
                Err(CaptureError::Timeout(self.deadline))
            }
        }
    }
}
