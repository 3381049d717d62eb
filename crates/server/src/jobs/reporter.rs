// crates/server/src/jobs/reporter.rs
//! Per-job write handle given to a running backup.

use std::sync::Arc;

use backup_manager_core::{ProgressInfo, ProgressSink};

use super::registry::JobRegistry;
use super::types::JobId;

/// Progress sink that writes into the registry entry for one job.
///
/// The spawned backup task owns the only reporter for its job, so it is the
/// single writer of that job's progress.
pub struct JobReporter {
    id: JobId,
    registry: Arc<JobRegistry>,
}

impl JobReporter {
    pub fn new(id: JobId, registry: Arc<JobRegistry>) -> Self {
        Self { id, registry }
    }
}

impl ProgressSink for JobReporter {
    fn report(&self, progress: ProgressInfo) {
        if let Err(e) = self.registry.update_progress(self.id, progress) {
            tracing::debug!(job_id = self.id, error = %e, "Dropping progress update");
        }
    }
}
