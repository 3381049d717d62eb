// crates/server/src/routes/backups.rs
//! Backup API routes.
//!
//! - POST /backups - Start a backup job for a source URI
//! - GET  /backups - List completed backups in the store

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use backup_manager_core::CompletedBackup;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::jobs::JobId;
use crate::state::AppState;

/// Request body for POST /api/backups.
#[derive(Debug, Deserialize)]
pub struct StartBackupRequest {
    /// URI of the blob to back up.
    pub uri: String,
}

/// Response for POST /api/backups (202 Accepted).
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct StartBackupResponse {
    pub success: bool,
    pub job_id: JobId,
}

/// Response for GET /api/backups.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct BackupListResponse {
    pub backups: Vec<CompletedBackup>,
}

/// POST /api/backups - Start a backup job.
///
/// The credential for the source comes from server configuration.
async fn start_backup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBackupRequest>,
) -> ApiResult<(StatusCode, Json<StartBackupResponse>)> {
    let job_id = state.backups.start_backup(&body.uri)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartBackupResponse {
            success: true,
            job_id,
        }),
    ))
}

/// GET /api/backups - List completed backups.
async fn list_completed(State(state): State<Arc<AppState>>) -> ApiResult<Json<BackupListResponse>> {
    let backups = state.backups.list_completed_backups().await?;
    Ok(Json(BackupListResponse { backups }))
}

/// Build the backups router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/backups", get(list_completed).post(start_backup))
}
