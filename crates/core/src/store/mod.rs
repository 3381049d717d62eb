// crates/core/src/store/mod.rs
//! Object stores that hold finished backup artifacts.
//!
//! Provides:
//! - `BackupStore` - list completed artifacts, open writers for new ones
//! - `BackupWriter` - chunked writer; an artifact is only listed after `commit`
//! - `LocalBackupStore` - directory on local disk
//! - `MemoryBackupStore` - in-process store for tests and demos

pub mod local;
pub mod memory;

pub use local::LocalBackupStore;
pub use memory::MemoryBackupStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::CompletedBackup;

/// Object store holding backup artifacts.
///
/// Implementations must be safe to call concurrently; callers apply no
/// locking of their own.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// List every committed artifact. A store that cannot be reached is an
    /// error, never an empty list.
    async fn list_backups(&self) -> Result<Vec<CompletedBackup>, StoreError>;

    /// Open a writer for a new artifact called `name`.
    async fn create(&self, name: &str) -> Result<Box<dyn BackupWriter>, StoreError>;

    /// Store name for logging (e.g. "local", "memory").
    fn name(&self) -> &str;
}

/// Writer for one in-flight artifact.
#[async_trait]
pub trait BackupWriter: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError>;

    /// Make the artifact visible to `list_backups`.
    async fn commit(self: Box<Self>) -> Result<CompletedBackup, StoreError>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>);
}

/// Reject names that could escape the store or collide with partial files.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.ends_with(local::PARTIAL_SUFFIX);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
