// crates/server/src/metrics.rs
//! Prometheus metrics for backup jobs and store access.
//!
//! The `record_*` helpers are no-ops until `init_metrics` installs a
//! recorder, so the registry and service call them unconditionally.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::OnceLock;
use std::time::Duration;

pub const JOBS_STARTED: &str = "backup_jobs_started_total";
pub const JOBS_FINISHED: &str = "backup_jobs_finished_total";
pub const JOBS_EVICTED: &str = "backup_jobs_evicted_total";
pub const JOBS_TRACKED: &str = "backup_jobs_tracked";
pub const JOB_DURATION: &str = "backup_job_duration_seconds";
pub const STORE_ERRORS: &str = "backup_store_errors_total";

/// Backups range from seconds (small blobs) to hours (full data disks).
const JOB_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0];

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// Returns `false` if a recorder was already installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = build_recorder();
    let handle = recorder.handle();
    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Metrics recorder already installed");
        return false;
    }
    // Only the caller that installed the recorder gets here.
    let _ = PROMETHEUS_HANDLE.set(handle);

    describe_counter!(JOBS_STARTED, "Backup jobs started");
    describe_counter!(JOBS_FINISHED, "Backup jobs finished, by outcome");
    describe_counter!(JOBS_EVICTED, "Finished jobs evicted from the registry");
    describe_gauge!(JOBS_TRACKED, "Jobs currently held in the registry");
    describe_histogram!(JOB_DURATION, metrics::Unit::Seconds, "Backup job wall-clock duration");
    describe_counter!(STORE_ERRORS, "Failed backup store listings, by store");

    tracing::info!("Prometheus metrics initialized");
    true
}

fn build_recorder() -> PrometheusRecorder {
    match PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(JOB_DURATION.to_string()), JOB_DURATION_BUCKETS)
    {
        Ok(builder) => builder.build_recorder(),
        Err(e) => {
            tracing::warn!(error = %e, "Invalid job duration buckets, using summaries");
            PrometheusBuilder::new().build_recorder()
        }
    }
}

/// Current metrics in Prometheus text format, or `None` before `init_metrics`.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn record_job_started() {
    counter!(JOBS_STARTED).increment(1);
}

/// `outcome` is the terminal status, `"completed"` or `"failed"`.
pub fn record_job_finished(outcome: &'static str, duration: Duration) {
    counter!(JOBS_FINISHED, "outcome" => outcome).increment(1);
    histogram!(JOB_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

pub fn record_jobs_evicted(count: usize) {
    counter!(JOBS_EVICTED).increment(count as u64);
}

pub fn record_jobs_tracked(count: usize) {
    gauge!(JOBS_TRACKED).set(count as f64);
}

pub fn record_store_error(store: &str) {
    counter!(STORE_ERRORS, "store" => store.to_string()).increment(1);
}
