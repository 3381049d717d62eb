//! End-to-end tests for the backup API.
//!
//! Drives the full Axum app against a mockito HTTP source and an in-memory
//! or on-disk backup store: start a backup, watch the job finish, list the
//! artifact.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use backup_manager_core::{BlobCopyOperation, LocalBackupStore, MemoryBackupStore};
use backup_manager_server::{create_app, AppState, BackupService, JobRegistry};
use pretty_assertions::assert_eq;
use tokio_stream::StreamExt;
use tower::ServiceExt;

/// Build an app whose jobs copy from HTTP into a shared in-memory store.
fn test_app(credential: Option<&str>) -> (Router, MemoryBackupStore) {
    let store = MemoryBackupStore::new();
    let operation = BlobCopyOperation::new(Duration::from_secs(5)).expect("http client");
    let service = BackupService::new(
        Arc::new(JobRegistry::new()),
        Arc::new(store.clone()),
        Arc::new(operation),
    )
    .with_credential(credential.map(str::to_string));
    (create_app(AppState::new(service)), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (
        status,
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    )
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn start_backup(app: &Router, source_uri: &str) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "uri": source_uri }).to_string();
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/backups")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

/// Poll the job until it leaves pending/running.
async fn wait_for_job(app: &Router, id: u64) -> serde_json::Value {
    for _ in 0..200 {
        let (status, job) = get(app, &format!("/api/jobs/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        if job["status"] == "completed" || job["status"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never finished");
}

#[tokio::test]
async fn test_backup_lifecycle_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let source = server
        .mock("GET", "/vhds/mongod.vhd")
        .match_header("authorization", "Bearer s3cret")
        .with_status(200)
        .with_body("database pages")
        .create_async()
        .await;
    let (app, store) = test_app(Some("s3cret"));

    let (status, started) = start_backup(&app, &format!("{}/vhds/mongod.vhd", server.url())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["success"], true);
    let id = started["jobId"].as_u64().unwrap();

    let job = wait_for_job(&app, id).await;
    source.assert_async().await;
    assert_eq!(job["status"], "completed");
    assert!(job["dateFinished"].is_string());
    assert_eq!(job["progressInfo"]["percent"], 100.0);
    assert_eq!(job["progressInfo"]["bytesCopied"], 14);

    let artifact = job["artifact"]["name"].as_str().unwrap().to_string();
    assert!(artifact.starts_with("mongod-"), "{artifact}");
    assert_eq!(store.contents(&artifact).unwrap(), b"database pages");

    let (status, listed) = get(&app, "/api/backups").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = listed["backups"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, vec![artifact.as_str()]);

    let (_, jobs) = get(&app, "/api/jobs").await;
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_source_twice_gives_two_intact_artifacts() {
    let mut server = mockito::Server::new_async().await;
    let counter = Arc::new(AtomicU8::new(0));
    let _source = server
        .mock("GET", "/vhds/mongod.vhd")
        .with_status(200)
        .with_body_from_request(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            vec![b'0' + n; 256 * 1024]
        })
        .expect(2)
        .create_async()
        .await;

    let tmp = tempfile::TempDir::new().unwrap();
    let operation = BlobCopyOperation::new(Duration::from_secs(5)).expect("http client");
    let service = BackupService::new(
        Arc::new(JobRegistry::new()),
        Arc::new(LocalBackupStore::new(tmp.path())),
        Arc::new(operation),
    );
    let app = create_app(AppState::new(service));

    let uri = format!("{}/vhds/mongod.vhd", server.url());
    let (_, first) = start_backup(&app, &uri).await;
    let (_, second) = start_backup(&app, &uri).await;

    let mut artifacts = Vec::new();
    for started in [first, second] {
        let job = wait_for_job(&app, started["jobId"].as_u64().unwrap()).await;
        assert_eq!(job["status"], "completed", "{job}");
        artifacts.push(job["artifact"]["name"].as_str().unwrap().to_string());
    }
    assert_ne!(artifacts[0], artifacts[1]);

    let contents: HashSet<Vec<u8>> = artifacts
        .iter()
        .map(|name| std::fs::read(tmp.path().join(name)).unwrap())
        .collect();
    let expected: HashSet<Vec<u8>> = [vec![b'1'; 256 * 1024], vec![b'2'; 256 * 1024]]
        .into_iter()
        .collect();
    assert!(contents == expected, "artifacts were mixed between jobs");

    let leftovers = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_source_error_fails_the_job() {
    let mut server = mockito::Server::new_async().await;
    let _source = server
        .mock("GET", "/vhds/missing.vhd")
        .with_status(404)
        .create_async()
        .await;
    let (app, store) = test_app(None);

    let (status, started) =
        start_backup(&app, &format!("{}/vhds/missing.vhd", server.url())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job = wait_for_job(&app, started["jobId"].as_u64().unwrap()).await;
    assert_eq!(job["status"], "failed");
    assert!(job["error"].as_str().unwrap().contains("404"));
    assert!(job.get("artifact").map_or(true, |a| a.is_null()));

    let (_, listed) = get(&app, "/api/backups").await;
    assert_eq!(listed["backups"], serde_json::json!([]));
    assert!(store.contents("missing.vhd").is_none());
}

#[tokio::test]
async fn test_job_ids_are_unique_across_requests() {
    let (app, _store) = test_app(None);

    let mut ids = Vec::new();
    for _ in 0..5 {
        let (status, started) = start_backup(&app, "http://127.0.0.1:9/unreachable").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        ids.push(started["jobId"].as_u64().unwrap());
    }

    let mut deduped = ids.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len());
}

#[tokio::test]
async fn test_job_stream_reports_completion() {
    let mut server = mockito::Server::new_async().await;
    let _source = server
        .mock("GET", "/blob")
        .with_status(200)
        .with_body("x")
        .create_async()
        .await;
    let (app, _store) = test_app(None);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/jobs/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let (_, started) = start_backup(&app, &format!("{}/blob", server.url())).await;
    let id = started["jobId"].as_u64().unwrap();

    let mut body = response.into_body().into_data_stream();
    let mut seen = String::new();
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains("\"status\":\"completed\"") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(finished, "no completion event in: {seen}");
    assert!(seen.contains("event: job"));
    assert!(seen.contains(&format!("\"id\":{id}")));
    assert!(seen.contains("\"status\":\"running\""));
}
