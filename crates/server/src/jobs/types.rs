// crates/server/src/jobs/types.rs
//! Types for the backup job registry.

use std::fmt;
use std::time::Duration;

use backup_manager_core::{CompletedBackup, ProgressInfo};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a backup job. Process-lifetime only.
pub type JobId = u64;

/// Status of a backup job.
///
/// Moves forward only: `Pending -> Running -> {Completed | Failed}`, or
/// straight from `Pending` to `Failed` when the operation never starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backup job record as held by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub source_uri: String,
    pub status: JobStatus,
    pub date_started: DateTime<Utc>,
    /// Set exactly once, together with a terminal status.
    pub date_finished: Option<DateTime<Utc>>,
    pub progress: ProgressInfo,
    /// Failure summary; present iff `status == Failed`.
    pub error: Option<String>,
    /// Produced artifact; present iff `status == Completed`.
    pub artifact: Option<CompletedBackup>,
}

impl Job {
    /// A new `Pending` job started now.
    pub fn new(id: JobId, source_uri: impl Into<String>) -> Self {
        Self {
            id,
            source_uri: source_uri.into(),
            status: JobStatus::Pending,
            date_started: Utc::now(),
            date_finished: None,
            progress: ProgressInfo::with_message("Queued"),
            error: None,
            artifact: None,
        }
    }

    /// True when the job finished more than `retention` before `now`.
    /// Unfinished jobs are never expired.
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        match self.date_finished {
            Some(finished) => now.signed_duration_since(finished) > retention,
            None => false,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            source_uri: self.source_uri.clone(),
            status: self.status,
            date_started: self.date_started,
            date_finished: self.date_finished,
            progress_info: self.progress.clone(),
            error: self.error.clone(),
        }
    }

    pub fn detail(&self) -> JobDetail {
        JobDetail {
            summary: self.summary(),
            artifact: self.artifact.clone(),
        }
    }
}

/// Wire view of a job for listings and the job stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub source_uri: String,
    pub status: JobStatus,
    pub date_started: DateTime<Utc>,
    pub date_finished: Option<DateTime<Utc>>,
    pub progress_info: ProgressInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire view of a single job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(flatten)]
    pub summary: JobSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<CompletedBackup>,
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {0} is already registered")]
    DuplicateId(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {0} has already finished")]
    AlreadyFinished(JobId),
}
