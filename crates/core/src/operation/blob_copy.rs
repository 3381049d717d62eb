// crates/core/src/operation/blob_copy.rs
//! Backup by streaming a source blob over HTTP into the backup store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};

use super::BackupOperation;
use crate::error::BackupError;
use crate::progress::ProgressSink;
use crate::store::BackupStore;
use crate::types::{artifact_name, check_source_uri, BackupRequest, CompletedBackup, ProgressInfo};

/// How the configured credential is presented to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential<'a> {
    /// Shared-access-signature query string.
    Sas(&'a str),
    Bearer(&'a str),
}

impl<'a> Credential<'a> {
    fn parse(token: &'a str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        if token.starts_with('?') || token.contains("sig=") {
            Some(Self::Sas(token.trim_start_matches('?')))
        } else {
            Some(Self::Bearer(token))
        }
    }
}

/// Streams the blob at `source_uri` into a new artifact, chunk by chunk.
pub struct BlobCopyOperation {
    client: Client,
}

impl BlobCopyOperation {
    /// Create an operation whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn source_url(request: &BackupRequest) -> Result<Url, BackupError> {
        let url = check_source_uri(&request.source_uri)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BackupError::InvalidSource {
                uri: request.source_uri.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        Ok(url)
    }
}

#[async_trait]
impl BackupOperation for BlobCopyOperation {
    async fn run(
        &self,
        request: BackupRequest,
        store: Arc<dyn BackupStore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<CompletedBackup, BackupError> {
        let mut url = Self::source_url(&request)?;
        let credential = request.credential.as_deref().and_then(Credential::parse);
        if let Some(Credential::Sas(sas)) = credential {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{sas}"),
                _ => sas.to_string(),
            };
            url.set_query(Some(&query));
        }

        progress.report(ProgressInfo::with_message("Connecting to source"));
        tracing::info!(job_id = request.job_id, source_uri = %request.source_uri, store = store.name(), "Starting blob copy");

        let mut builder = self.client.get(url);
        if let Some(Credential::Bearer(token)) = credential {
            builder = builder.bearer_auth(token);
        }
        let mut response = builder
            .send()
            .await
            .map_err(|e| BackupError::transfer(&request.source_uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::SourceStatus {
                uri: request.source_uri.clone(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let name = artifact_name(&request.source_uri, request.job_id, Utc::now());
        let mut writer = store.create(&name).await?;
        let mut copied: u64 = 0;

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = writer.write(&chunk).await {
                        writer.abort().await;
                        return Err(e.into());
                    }
                    copied += chunk.len() as u64;
                    progress.report(ProgressInfo::bytes(copied, total));
                }
                Ok(None) => break,
                Err(e) => {
                    writer.abort().await;
                    return Err(BackupError::transfer(&request.source_uri, e));
                }
            }
        }

        let backup = writer.commit().await?;

        let mut done = ProgressInfo::bytes(copied, Some(total.unwrap_or(copied)));
        done.message = Some(format!("Backed up to {}", backup.name));
        progress.report(done);
        tracing::info!(job_id = request.job_id, artifact = %backup.name, bytes = copied, "Blob copy complete");

        Ok(backup)
    }

    fn name(&self) -> &str {
        "blob-copy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use crate::store::MemoryBackupStore;
    use mockito::Matcher;

    fn operation() -> BlobCopyOperation {
        BlobCopyOperation::new(Duration::from_secs(5)).unwrap()
    }

    fn request(uri: String, credential: Option<&str>) -> BackupRequest {
        BackupRequest {
            job_id: 7,
            source_uri: uri,
            credential: credential.map(str::to_string),
        }
    }

    #[test]
    fn test_credential_parse() {
        assert_eq!(Credential::parse(""), None);
        assert_eq!(
            Credential::parse("?sv=2024-01-01&sig=abc"),
            Some(Credential::Sas("sv=2024-01-01&sig=abc"))
        );
        assert_eq!(Credential::parse("sv=1&sig=x"), Some(Credential::Sas("sv=1&sig=x")));
        assert_eq!(Credential::parse("opaque-token"), Some(Credential::Bearer("opaque-token")));
    }

    #[tokio::test]
    async fn test_copies_blob_with_sas_credential() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data/mongod.vhd")
            .match_query(Matcher::UrlEncoded("sig".into(), "abc".into()))
            .with_status(200)
            .with_body("mongo bytes")
            .create_async()
            .await;

        let store = MemoryBackupStore::new();
        let progress = Arc::new(RecordingProgress::new());
        let backup = operation()
            .run(
                request(format!("{}/data/mongod.vhd", server.url()), Some("?sv=1&sig=abc")),
                Arc::new(store.clone()),
                progress.clone(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(backup.name.starts_with("mongod-"));
        assert_eq!(store.contents(&backup.name).unwrap(), b"mongo bytes");

        let last = progress.last().unwrap();
        assert_eq!(last.bytes_copied, 11);
        assert_eq!(last.percent, 100.0);
        assert!(last.message.unwrap().contains(&backup.name));
    }

    #[tokio::test]
    async fn test_sends_bearer_credential() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blob")
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_body("x")
            .create_async()
            .await;

        let store = MemoryBackupStore::new();
        operation()
            .run(
                request(format!("{}/blob", server.url()), Some("token-123")),
                Arc::new(store),
                Arc::new(RecordingProgress::new()),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_fails_without_artifact() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.vhd")
            .with_status(404)
            .create_async()
            .await;

        let store = MemoryBackupStore::new();
        let err = operation()
            .run(
                request(format!("{}/missing.vhd", server.url()), None),
                Arc::new(store.clone()),
                Arc::new(RecordingProgress::new()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::SourceStatus { status: 404, .. }));
        assert!(store.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_http_source() {
        let err = operation()
            .run(
                request("ftp://example/src".to_string(), None),
                Arc::new(MemoryBackupStore::new()),
                Arc::new(RecordingProgress::new()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::InvalidSource { .. }));
    }
}
