// crates/core/src/operation/mod.rs
//! The long-running step that turns a backup source into a stored artifact.

pub mod blob_copy;

pub use blob_copy::BlobCopyOperation;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackupError;
use crate::progress::ProgressSink;
use crate::store::BackupStore;
use crate::types::{BackupRequest, CompletedBackup};

/// A backup data transfer.
///
/// Implementations include:
/// - `BlobCopyOperation` - streams a blob over HTTP into the store
#[async_trait]
pub trait BackupOperation: Send + Sync {
    /// Run one backup to completion, reporting progress as it goes.
    async fn run(
        &self,
        request: BackupRequest,
        store: Arc<dyn BackupStore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<CompletedBackup, BackupError>;

    /// Operation name for logging (e.g. "blob-copy").
    fn name(&self) -> &str;
}
