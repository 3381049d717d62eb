// crates/core/src/types.rs
//! Shared types for backup artifacts, requests and progress.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackupError;

/// A finished backup artifact held by a [`crate::store::BackupStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedBackup {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl CompletedBackup {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            size_bytes: None,
            last_modified: None,
        }
    }
}

/// Progress summary reported by a running backup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    /// 0.0 ..= 100.0
    pub percent: f64,
    pub bytes_copied: u64,
    pub total_bytes: Option<u64>,
    pub message: Option<String>,
}

impl ProgressInfo {
    pub fn with_message(msg: impl Into<String>) -> Self {
        Self {
            message: Some(msg.into()),
            ..Self::default()
        }
    }

    /// Progress after `bytes_copied` of an optionally known total.
    pub fn bytes(bytes_copied: u64, total_bytes: Option<u64>) -> Self {
        let percent = match total_bytes {
            Some(0) => 100.0,
            Some(total) => ((bytes_copied as f64 / total as f64) * 100.0).min(100.0),
            None => 0.0,
        };
        Self {
            percent,
            bytes_copied,
            total_bytes,
            message: None,
        }
    }
}

/// Everything a [`crate::operation::BackupOperation`] needs to run one job.
#[derive(Clone)]
pub struct BackupRequest {
    pub job_id: u64,
    pub source_uri: String,
    /// Process-wide credential for the source; never supplied by API callers.
    pub credential: Option<String>,
}

impl fmt::Debug for BackupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupRequest")
            .field("job_id", &self.job_id)
            .field("source_uri", &self.source_uri)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Check that `uri` is an absolute URI a backup could be taken from.
pub fn check_source_uri(uri: &str) -> Result<Url, BackupError> {
    let invalid = |reason: String| BackupError::InvalidSource {
        uri: uri.to_string(),
        reason,
    };
    if uri.trim().is_empty() {
        return Err(invalid("URI is empty".to_string()));
    }
    let url = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("URI has no host".to_string()));
    }
    Ok(url)
}

/// Build an artifact name from the source blob's file stem, the time and the
/// job id, e.g. `https://acct/blobs/mongod.vhd` -> `mongod-20260101T120000Z-7.bak`.
///
/// Unique per job, even for two backups of one source in the same second.
pub fn artifact_name(source_uri: &str, job_id: u64, at: DateTime<Utc>) -> String {
    let stem = Url::parse(source_uri)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .map(|segment| match segment.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => segment,
        })
        .map(|stem| {
            stem.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect::<String>()
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "backup".to_string());

    format!("{}-{}-{}.bak", stem, at.format("%Y%m%dT%H%M%SZ"), job_id)
}
