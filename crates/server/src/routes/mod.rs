// crates/server/src/routes/mod.rs
//! API route handlers for the backup manager.

pub mod backups;
pub mod health;
pub mod jobs;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health      - Health check
/// - POST /api/backups     - Start a backup job
/// - GET  /api/backups     - List completed backups
/// - GET  /api/jobs        - List tracked jobs (evicts long-finished ones)
/// - GET  /api/jobs/{id}   - Show one job
/// - GET  /api/jobs/stream - SSE stream of job updates
/// - GET  /metrics         - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", backups::router())
        .nest("/api", jobs::router())
        .merge(metrics::router())
        .with_state(state)
}
