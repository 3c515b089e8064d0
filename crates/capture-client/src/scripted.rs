use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::CaptureError;
use crate::model::{CaptureRequest, PageSnapshot, VisualCompareRequest, VisualVerdict};
use crate::CaptureClient;

/// In-memory capture double driven by a queue of pre-scripted outcomes.
///
/// Suitable for unit and scenario tests and for early integration before a
/// real collaborator transport is wired in. Requests are recorded so tests
/// can assert on what the engine asked for.
#[derive(Default)]
pub struct ScriptedCapture {
    captures: Mutex<VecDeque<Result<PageSnapshot, CaptureError>>>,
    verdicts: Mutex<VecDeque<Result<VisualVerdict, CaptureError>>>,
    seen_captures: Mutex<Vec<CaptureRequest>>,
    seen_compares: Mutex<Vec<VisualCompareRequest>>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next capture outcome.
    pub fn push_snapshot(&self, snapshot: PageSnapshot) {
        self.captures.lock().push_back(Ok(snapshot));
    }

    pub fn push_capture_error(&self, error: CaptureError) {
        self.captures.lock().push_back(Err(error));
    }

    /// Queue the next visual-compare outcome.
    pub fn push_verdict(&self, verdict: VisualVerdict) {
        self.verdicts.lock().push_back(Ok(verdict));
    }

    pub fn push_compare_error(&self, error: CaptureError) {
        self.verdicts.lock().push_back(Err(error));
    }

    /// Capture requests observed so far, oldest first.
    pub fn capture_requests(&self) -> Vec<CaptureRequest> {
        self.seen_captures.lock().clone()
    }

    pub fn compare_requests(&self) -> Vec<VisualCompareRequest> {
        self.seen_compares.lock().clone()
    }

    pub fn pending_captures(&self) -> usize {
        self.captures.lock().len()
    }
}

#[async_trait]
impl CaptureClient for ScriptedCapture {
    async fn capture(&self, request: CaptureRequest) -> Result<PageSnapshot, CaptureError> {
        self.seen_captures.lock().push(request);
        self.captures
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CaptureError::failed("no scripted snapshot queued")))
    }

    async fn compare_visual(
        &self,
        request: VisualCompareRequest,
    ) -> Result<VisualVerdict, CaptureError> {
        self.seen_compares.lock().push(request);
        self.verdicts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CaptureError::compare_failed("no scripted verdict queued")))
    }
}
