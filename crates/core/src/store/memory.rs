// crates/core/src/store/memory.rs
//! In-process backup store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use super::{validate_name, BackupStore, BackupWriter};
use crate::error::StoreError;
use crate::types::CompletedBackup;

type Artifacts = Arc<Mutex<BTreeMap<String, (CompletedBackup, Vec<u8>)>>>;

/// Backup store that keeps artifacts in memory. Cloning shares the contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackupStore {
    artifacts: Artifacts,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of a committed artifact.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.artifacts).get(name).map(|(_, bytes)| bytes.clone())
    }

    /// Add a committed artifact directly.
    pub fn insert(&self, name: &str, bytes: impl Into<Vec<u8>>) -> CompletedBackup {
        let bytes = bytes.into();
        let backup = CompletedBackup {
            name: name.to_string(),
            uri: format!("memory://{name}"),
            size_bytes: Some(bytes.len() as u64),
            last_modified: Some(Utc::now()),
        };
        lock(&self.artifacts).insert(name.to_string(), (backup.clone(), bytes));
        backup
    }
}

fn lock(
    artifacts: &Artifacts,
) -> std::sync::MutexGuard<'_, BTreeMap<String, (CompletedBackup, Vec<u8>)>> {
    match artifacts.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("Mutex poisoned in memory backup store");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn list_backups(&self) -> Result<Vec<CompletedBackup>, StoreError> {
        Ok(lock(&self.artifacts)
            .values()
            .map(|(backup, _)| backup.clone())
            .collect())
    }

    async fn create(&self, name: &str) -> Result<Box<dyn BackupWriter>, StoreError> {
        validate_name(name)?;
        if lock(&self.artifacts).contains_key(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(Box::new(MemoryBackupWriter {
            name: name.to_string(),
            buffer: Vec::new(),
            store: self.clone(),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryBackupWriter {
    name: String,
    buffer: Vec<u8>,
    store: MemoryBackupStore,
}

#[async_trait]
impl BackupWriter for MemoryBackupWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<CompletedBackup, StoreError> {
        let MemoryBackupWriter { name, buffer, store } = *self;
        Ok(store.insert(&name, buffer))
    }

    async fn abort(self: Box<Self>) {}
}
