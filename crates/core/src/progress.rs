// crates/core/src/progress.rs
//! Progress reporting seam between a backup operation and whoever tracks it.

use crate::types::ProgressInfo;

/// Receives progress updates from a running backup.
///
/// The server implements this on a per-job handle backed by the job
/// registry.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: ProgressInfo);
}

/// Sink that keeps every update, for assertions.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingProgress {
    updates: std::sync::Mutex<Vec<ProgressInfo>>,
}

#[cfg(test)]
impl RecordingProgress {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn updates(&self) -> Vec<ProgressInfo> {
        self.updates.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> Option<ProgressInfo> {
        self.updates().pop()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn report(&self, progress: ProgressInfo) {
        self.updates.lock().unwrap().push(progress);
    }
}
