// crates/core/src/store/local.rs
//! Backup store backed by a directory on local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{validate_name, BackupStore, BackupWriter};
use crate::error::StoreError;
use crate::types::CompletedBackup;

/// Suffix for artifacts still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Directory of backup artifacts.
///
/// New artifacts are written to `<name>.partial` and renamed into place on
/// commit, so a crashed or failed backup never shows up as completed.
#[derive(Debug, Clone)]
pub struct LocalBackupStore {
    root: PathBuf,
}

impl LocalBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn file_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(|url| url.to_string())
        .unwrap_or_else(|()| path.display().to_string())
}

#[async_trait]
impl BackupStore for LocalBackupStore {
    async fn list_backups(&self) -> Result<Vec<CompletedBackup>, StoreError> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::unavailable(self.root.display().to_string(), e)
            } else {
                StoreError::io(&self.root, e)
            }
        })?;

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    // Removed between read_dir and stat.
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }

            backups.push(CompletedBackup {
                uri: file_uri(&path),
                name,
                size_bytes: Some(metadata.len()),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        Ok(backups)
    }

    async fn create(&self, name: &str) -> Result<Box<dyn BackupWriter>, StoreError> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let final_path = self.root.join(name);
        if fs::try_exists(&final_path)
            .await
            .map_err(|e| StoreError::io(&final_path, e))?
        {
            return Err(StoreError::io(
                &final_path,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "backup already exists"),
            ));
        }

        // create_new: a second writer for the same name must not truncate
        // the first one's partial file.
        let partial_path = self.root.join(format!("{name}{PARTIAL_SUFFIX}"));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial_path)
            .await
            .map_err(|e| StoreError::io(&partial_path, e))?;

        Ok(Box::new(LocalBackupWriter {
            name: name.to_string(),
            file,
            partial_path,
            final_path,
            written: 0,
        }))
    }

    fn name(&self) -> &str {
        "local"
    }
}

struct LocalBackupWriter {
    name: String,
    file: fs::File,
    partial_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

#[async_trait]
impl BackupWriter for LocalBackupWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StoreError::io(&self.partial_path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<CompletedBackup, StoreError> {
        let finished = match self.file.flush().await {
            Ok(()) => self.file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = finished {
            remove_partial(&self.partial_path).await;
            return Err(StoreError::io(&self.partial_path, e));
        }
        if let Err(e) = fs::rename(&self.partial_path, &self.final_path).await {
            remove_partial(&self.partial_path).await;
            return Err(StoreError::io(&self.final_path, e));
        }

        tracing::debug!(name = %self.name, bytes = self.written, "Committed backup artifact");

        let LocalBackupWriter {
            name,
            final_path,
            written,
            ..
        } = *self;
        Ok(CompletedBackup {
            uri: file_uri(&final_path),
            name,
            size_bytes: Some(written),
            last_modified: Some(Utc::now()),
        })
    }

    async fn abort(self: Box<Self>) {
        let LocalBackupWriter { file, partial_path, .. } = *self;
        drop(file);
        remove_partial(&partial_path).await;
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial backup");
    }
}
