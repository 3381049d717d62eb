// crates/server/src/jobs/mod.rs
//! Backup job tracking.
//!
//! Provides:
//! - `JobRegistry` - concurrent map of jobs with time-based eviction
//! - `JobReporter` - per-job progress handle for the running backup
//! - `Job` / `JobSummary` / `JobDetail` - record and wire views

pub mod registry;
pub mod reporter;
pub mod types;

pub use registry::JobRegistry;
pub use reporter::JobReporter;
pub use types::{Job, JobDetail, JobError, JobId, JobStatus, JobSummary};
