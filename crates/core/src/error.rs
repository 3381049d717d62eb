// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a backup object store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backup store unavailable at {location}: {reason}")]
    Unavailable { location: String, reason: String },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid backup name: {0:?}")]
    InvalidName(String),

    #[error("Backup not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a running backup operation.
///
/// These never reach the caller that started the job; they end up as the
/// job's failure summary.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Invalid backup source {uri}: {reason}")]
    InvalidSource { uri: String, reason: String },

    #[error("Transfer from {uri} failed: {message}")]
    Transfer { uri: String, message: String },

    #[error("Source {uri} returned HTTP {status}")]
    SourceStatus { uri: String, status: u16 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backup operation panicked: {0}")]
    Panicked(String),
}

impl BackupError {
    pub fn transfer(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Transfer {
            uri: uri.into(),
            message: message.to_string(),
        }
    }
}
