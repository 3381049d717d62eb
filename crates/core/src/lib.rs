// crates/core/src/lib.rs
//! Backup domain: artifact stores, the backup data transfer, and the types
//! shared between them.

pub mod error;
pub mod operation;
pub mod progress;
pub mod store;
pub mod types;

pub use error::*;
pub use operation::{BackupOperation, BlobCopyOperation};
pub use progress::ProgressSink;
pub use store::{BackupStore, BackupWriter, LocalBackupStore, MemoryBackupStore};
pub use types::*;
