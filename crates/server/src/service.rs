// crates/server/src/service.rs
//! Backup orchestration: starting jobs and listing finished backups.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backup_manager_core::{
    check_source_uri, BackupError, BackupOperation, BackupRequest, BackupStore, CompletedBackup,
    ProgressSink, StoreError,
};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::DEFAULT_JOB_RETENTION;
use crate::jobs::{Job, JobError, JobId, JobRegistry, JobReporter, JobSummary};
use crate::metrics::{record_job_finished, record_job_started, record_store_error};

/// Errors surfaced to callers of [`BackupService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid backup source {uri:?}: {reason}")]
    InvalidSource { uri: String, reason: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Starts backup jobs and reports on finished backups.
pub struct BackupService {
    registry: Arc<JobRegistry>,
    store: Arc<dyn BackupStore>,
    operation: Arc<dyn BackupOperation>,
    credential: Option<String>,
    job_retention: Duration,
}

impl BackupService {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn BackupStore>,
        operation: Arc<dyn BackupOperation>,
    ) -> Self {
        Self {
            registry,
            store,
            operation,
            credential: None,
            job_retention: DEFAULT_JOB_RETENTION,
        }
    }

    /// Credential handed to every backup operation.
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    /// How long finished jobs stay listed.
    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = retention;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register a `Pending` job for `source_uri` and run the backup in the
    /// background. Returns as soon as the job is registered.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_backup(&self, source_uri: &str) -> Result<JobId, ServiceError> {
        let source_uri = source_uri.trim();
        check_source_uri(source_uri).map_err(|e| match e {
            BackupError::InvalidSource { uri, reason } => ServiceError::InvalidSource { uri, reason },
            other => ServiceError::InvalidSource {
                uri: source_uri.to_string(),
                reason: other.to_string(),
            },
        })?;

        let id = self.registry.next_id();
        if let Err(e) = self.registry.insert(Job::new(id, source_uri)) {
            tracing::error!(job_id = id, error = %e, "Job id allocated twice");
            debug_assert!(false, "job id {id} allocated twice");
            return Err(e.into());
        }
        record_job_started();
        tracing::info!(
            job_id = id,
            source_uri,
            operation = self.operation.name(),
            store = self.store.name(),
            "Backup job started"
        );

        let request = BackupRequest {
            job_id: id,
            source_uri: source_uri.to_string(),
            credential: self.credential.clone(),
        };
        tokio::spawn(run_job(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&self.operation),
            request,
        ));

        Ok(id)
    }

    /// Every completed backup in the store, newest first.
    pub async fn list_completed_backups(&self) -> Result<Vec<CompletedBackup>, ServiceError> {
        let mut backups = match self.store.list_backups().await {
            Ok(backups) => backups,
            Err(e) => {
                record_store_error(self.store.name());
                return Err(e.into());
            }
        };
        backups.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(backups)
    }

    /// Evict jobs past the retention window, then list the rest.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.registry.evict_and_list(self.job_retention)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job, ServiceError> {
        Ok(self.registry.get(id)?)
    }

    /// Subscribe to job changes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobSummary> {
        self.registry.subscribe()
    }
}

/// Body of the background task for one job. Every outcome, including a
/// panic inside the operation, ends in a terminal job status.
async fn run_job(
    registry: Arc<JobRegistry>,
    store: Arc<dyn BackupStore>,
    operation: Arc<dyn BackupOperation>,
    request: BackupRequest,
) {
    let id = request.job_id;
    let started = Instant::now();

    if let Err(e) = registry.mark_running(id) {
        tracing::error!(job_id = id, error = %e, "Could not start backup job");
        return;
    }

    let reporter: Arc<dyn ProgressSink> = Arc::new(JobReporter::new(id, Arc::clone(&registry)));
    let task = tokio::spawn(async move { operation.run(request, store, reporter).await });

    let outcome = match task.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            Err(BackupError::Panicked(panic_message(join_err.into_panic())))
        }
        Err(join_err) => Err(BackupError::Panicked(join_err.to_string())),
    };

    let finished = match outcome {
        Ok(artifact) => {
            tracing::info!(job_id = id, artifact = %artifact.name, "Backup job completed");
            record_job_finished("completed", started.elapsed());
            registry.complete(id, artifact)
        }
        Err(e) => {
            tracing::warn!(job_id = id, error = %e, "Backup job failed");
            record_job_finished("failed", started.elapsed());
            registry.fail(id, e.to_string())
        }
    };
    if let Err(e) = finished {
        tracing::error!(job_id = id, error = %e, "Could not record backup job outcome");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
