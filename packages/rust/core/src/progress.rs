//! Progress reporting shared by the retrieval and processing stages.

use std::time::Duration;

use docsift_shared::RunId;

use crate::pipeline::SkipReason;

/// Summary handed to [`ProgressReporter::done`] when a stage finishes.
#[derive(Debug, Clone)]
pub struct StageSummary {
    /// Identifier recorded on the stage's tracing span.
    pub run_id: RunId,
    /// `"retrieve"` or `"process"`.
    pub stage: &'static str,
    /// Items the stage received (search hits or documents).
    pub received: usize,
    /// Items that made it into the output payload.
    pub kept: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl StageSummary {
    pub fn skipped(&self) -> usize {
        self.received.saturating_sub(self.kept)
    }
}

/// Progress callback for reporting stage status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a page is fetched during retrieval.
    fn page_fetched(&self, url: &str, current: usize, total: usize);
    /// Called before a document is processed.
    fn document_started(&self, url: &str, current: usize, total: usize);
    /// Called when a document is dropped from the output.
    fn document_skipped(&self, url: &str, reason: &SkipReason);
    /// Called when the stage completes.
    fn done(&self, summary: &StageSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
    fn document_started(&self, _url: &str, _current: usize, _total: usize) {}
    fn document_skipped(&self, _url: &str, _reason: &SkipReason) {}
    fn done(&self, _summary: &StageSummary) {}
}
