// crates/server/src/jobs/registry.rs
//! Concurrent registry of backup jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use backup_manager_core::{CompletedBackup, ProgressInfo};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::types::{Job, JobError, JobId, JobStatus, JobSummary};
use crate::metrics::{record_jobs_evicted, record_jobs_tracked};

/// Process-wide store of backup jobs keyed by id.
///
/// One mutex covers the whole map and is held for the full duration of
/// every operation, snapshot copies included. Reads hand out owned clones,
/// never the live map. Every change is broadcast as a [`JobSummary`].
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, Job>>,
    updates_tx: broadcast::Sender<JobSummary>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (updates_tx, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
            updates_tx,
        }
    }

    /// Allocate a fresh job id.
    pub fn next_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Mutex poisoned on jobs map, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, job: &Job) {
        // No subscribers is fine.
        let _ = self.updates_tx.send(job.summary());
    }

    /// Register a new job. A duplicate id is a programming error.
    pub fn insert(&self, job: Job) -> Result<(), JobError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            return Err(JobError::DuplicateId(job.id));
        }
        self.publish(&job);
        jobs.insert(job.id, job);
        record_jobs_tracked(jobs.len());
        Ok(())
    }

    /// Copy of the job with `id`.
    pub fn get(&self, id: JobId) -> Result<Job, JobError> {
        self.lock().get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    /// Snapshot of every job, ordered by id.
    pub fn list_all(&self) -> Vec<Job> {
        snapshot(&self.lock())
    }

    /// Remove every job that finished more than `retention` ago.
    /// Returns how many were removed.
    pub fn evict_older_than(&self, retention: Duration) -> usize {
        let mut jobs = self.lock();
        evict(&mut jobs, retention, Utc::now())
    }

    /// Evict expired jobs, then snapshot the rest, without releasing the
    /// lock in between.
    pub fn evict_and_list(&self, retention: Duration) -> Vec<Job> {
        let mut jobs = self.lock();
        evict(&mut jobs, retention, Utc::now());
        snapshot(&jobs)
    }

    /// Move a pending job to `Running`.
    pub fn mark_running(&self, id: JobId) -> Result<(), JobError> {
        self.transition(id, JobStatus::Running, |job| {
            job.progress = ProgressInfo::with_message("Running");
        })
    }

    /// Replace the progress of an unfinished job.
    pub fn update_progress(&self, id: JobId, progress: ProgressInfo) -> Result<(), JobError> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if job.status.is_terminal() {
            return Err(JobError::AlreadyFinished(id));
        }
        job.progress = progress;
        self.publish(job);
        Ok(())
    }

    /// Finish a running job successfully.
    pub fn complete(&self, id: JobId, artifact: CompletedBackup) -> Result<(), JobError> {
        let finished = Utc::now();
        self.transition(id, JobStatus::Completed, move |job| {
            job.progress.percent = 100.0;
            if job.progress.message.is_none() {
                job.progress.message = Some(format!("Backed up to {}", artifact.name));
            }
            job.artifact = Some(artifact);
            job.date_finished = Some(finished);
        })
    }

    /// Finish a job with a failure summary.
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        let finished = Utc::now();
        self.transition(id, JobStatus::Failed, move |job| {
            job.progress.message = Some("Backup failed".to_string());
            job.error = Some(error);
            job.date_finished = Some(finished);
        })
    }

    /// Status change and its side fields land in one step under the lock, so
    /// no reader sees `date_finished` without a terminal status.
    fn transition(
        &self,
        id: JobId,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), JobError> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if !job.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                id,
                from: job.status,
                to,
            });
        }
        apply(job);
        job.status = to;
        self.publish(job);
        Ok(())
    }

    /// Subscribe to every job change (for SSE streaming).
    pub fn subscribe(&self) -> broadcast::Receiver<JobSummary> {
        self.updates_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(jobs: &HashMap<JobId, Job>) -> Vec<Job> {
    let mut list: Vec<Job> = jobs.values().cloned().collect();
    list.sort_by_key(|job| job.id);
    list
}

fn evict(jobs: &mut HashMap<JobId, Job>, retention: Duration, now: DateTime<Utc>) -> usize {
    let before = jobs.len();
    jobs.retain(|_, job| !job.is_expired(retention, now));
    let removed = before - jobs.len();
    if removed > 0 {
        tracing::debug!(removed, remaining = jobs.len(), "Evicted finished jobs");
        record_jobs_evicted(removed);
        record_jobs_tracked(jobs.len());
    }
    removed
}
