// crates/server/src/routes/jobs.rs
//! API routes for backup job tracking.
//!
//! - GET /jobs        - List tracked jobs (evicts long-finished ones first)
//! - GET /jobs/{id}   - Show one job
//! - GET /jobs/stream - SSE stream of job updates

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiResult;
use crate::jobs::{Job, JobDetail, JobId, JobSummary};
use crate::state::AppState;

/// Response for GET /api/jobs.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
}

/// GET /api/jobs - List all tracked jobs.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    let jobs = state.backups.list_jobs().iter().map(Job::summary).collect();
    Json(JobListResponse { jobs })
}

/// GET /api/jobs/{id} - Show one job.
async fn show_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<JobDetail>> {
    Ok(Json(state.backups.get_job(id)?.detail()))
}

/// GET /api/jobs/stream - SSE stream of all job updates.
async fn stream_jobs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.backups.subscribe();

    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(summary) => {
                    let json = serde_json::to_string(&summary).unwrap_or_default();
                    yield Ok(Event::default().event("job").data(json));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Job stream subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stream", get(stream_jobs))
        .route("/jobs/{id}", get(show_job))
}
