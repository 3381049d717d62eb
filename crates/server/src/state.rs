// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use backup_manager_core::{BackupOperation, BlobCopyOperation, LocalBackupStore, MemoryBackupStore};

use crate::config::ServerConfig;
use crate::jobs::JobRegistry;
use crate::service::BackupService;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Backup orchestration; owns the single job registry for the process.
    pub backups: BackupService,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(backups: BackupService) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            backups,
        })
    }

    /// Wire up the local-disk store and HTTP blob copy from configuration.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Arc<Self>> {
        let operation = BlobCopyOperation::new(config.transfer_timeout)?;
        let service = BackupService::new(
            Arc::new(JobRegistry::new()),
            Arc::new(LocalBackupStore::new(&config.store_dir)),
            Arc::new(operation),
        )
        .with_credential(config.credential.clone())
        .with_job_retention(config.job_retention);
        Ok(Self::new(service))
    }

    /// State backed by an in-memory store (for tests and demos).
    pub fn in_memory(operation: Arc<dyn BackupOperation>) -> (Arc<Self>, MemoryBackupStore) {
        let store = MemoryBackupStore::new();
        let service = BackupService::new(
            Arc::new(JobRegistry::new()),
            Arc::new(store.clone()),
            operation,
        );
        (Self::new(service), store)
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
