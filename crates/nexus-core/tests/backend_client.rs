mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{MockReply, MockState, spawn_mock_backend, unreachable_origin};
use nexus_core::{BackendClient, ClientError, HealthMonitor, HealthStatus, UploadFile};
use serde_json::json;

fn pdf() -> UploadFile {
    UploadFile::from_bytes("report.pdf", Some("application/pdf"), b"%PDF-1.4 fake".to_vec())
}

#[tokio::test]
async fn ingest_sends_multipart_file_field_and_parses_session() {
    let server = spawn_mock_backend(MockState::default()).await;
    let client = BackendClient::new(&server.url);

    let ingest = client.ingest_file(&pdf()).await.expect("ingest should succeed");

    assert_eq!(ingest.session_id, "abc123");
    assert_eq!(ingest.modality, "document");
    assert_eq!(ingest.chunks, Some(3));

    let uploads = server.state.uploads.lock().await.clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("report.pdf"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(uploads[0].size, b"%PDF-1.4 fake".len());
}

#[tokio::test]
async fn ingest_reads_file_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "plain text notes").expect("write fixture");

    let server = spawn_mock_backend(MockState::default()).await;
    let client = BackendClient::new(&server.url);

    client
        .ingest_file(&UploadFile::from_path(&path))
        .await
        .expect("ingest should succeed");

    let uploads = server.state.uploads.lock().await.clone();
    assert_eq!(uploads[0].file_name.as_deref(), Some("notes.txt"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("text/plain"));
    assert_eq!(uploads[0].size, "plain text notes".len());
}

#[tokio::test]
async fn ingest_error_uses_json_detail() {
    let server = spawn_mock_backend(MockState::with_ingest(MockReply::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "Ingestion failed: unreadable pdf"}),
    )))
    .await;
    let client = BackendClient::new(&server.url);

    let err = client.ingest_file(&pdf()).await.unwrap_err();
    match err {
        ClientError::Http { status, detail } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(detail, "Ingestion failed: unreadable pdf");
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn ingest_error_falls_back_to_raw_text() {
    let server = spawn_mock_backend(MockState::with_ingest(MockReply::text(
        StatusCode::BAD_GATEWAY,
        "upstream exploded",
    )))
    .await;
    let client = BackendClient::new(&server.url);

    let err = client.ingest_file(&pdf()).await.unwrap_err();
    assert_eq!(err.to_string(), "upstream exploded");
}

#[tokio::test]
async fn ingest_success_with_wrong_shape_is_invalid_payload() {
    let server = spawn_mock_backend(MockState::with_ingest(MockReply::json(
        StatusCode::OK,
        json!({"status": "success"}),
    )))
    .await;
    let client = BackendClient::new(&server.url);

    let err = client.ingest_file(&pdf()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidPayload(_)));
}

#[tokio::test]
async fn ingest_deadline_produces_timeout() {
    let state = MockState {
        ingest_delay: Duration::from_secs(5),
        ..MockState::default()
    };
    let server = spawn_mock_backend(state).await;
    let client = BackendClient::new(&server.url)
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(5));

    let err = client.ingest_file(&pdf()).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn query_posts_question_and_session() {
    let server = spawn_mock_backend(MockState::default()).await;
    let client = BackendClient::new(&server.url);

    let answer = client
        .query("What is in Q3?", "abc123")
        .await
        .expect("query should succeed");
    assert_eq!(answer, "The report covers **Q3 revenue**.");

    let queries = server.state.queries.lock().await.clone();
    assert_eq!(queries, vec![json!({"question": "What is in Q3?", "session_id": "abc123"})]);
}

#[tokio::test]
async fn query_deadline_produces_timeout() {
    let state = MockState {
        query_delay: Duration::from_secs(5),
        ..MockState::default()
    };
    let server = spawn_mock_backend(state).await;
    let client = BackendClient::new(&server.url)
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(200));

    let err = client.query("slow?", "abc123").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { endpoint: "/query" }));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let origin = unreachable_origin().await;
    let client = BackendClient::new(&origin);

    let err = client.query("anyone?", "abc123").await.unwrap_err();
    match err {
        ClientError::Network { base_url, .. } => assert_eq!(base_url, origin),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn warmup_hits_endpoint() {
    let server = spawn_mock_backend(MockState::default()).await;
    let client = BackendClient::new(&server.url);

    client.warmup().await.expect("warmup should succeed");
    assert_eq!(server.state.hit_count("GET /warmup").await, 1);
}

#[tokio::test]
async fn health_monitor_stops_on_first_success() {
    let server = spawn_mock_backend(MockState::with_health(vec![
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::SERVICE_UNAVAILABLE,
    ]))
    .await;
    let client = BackendClient::new(&server.url);
    let monitor = HealthMonitor::new(10, Duration::from_millis(10));

    let mut attempts = Vec::new();
    let status = monitor.run(&client, |n| attempts.push(n)).await;

    assert_eq!(status, HealthStatus::Online);
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(server.state.hit_count("GET /health").await, 3);
}

#[tokio::test]
async fn health_monitor_gives_up_after_retries() {
    let server = spawn_mock_backend(MockState::with_health(vec![StatusCode::INTERNAL_SERVER_ERROR; 5])).await;
    let client = BackendClient::new(&server.url);
    let monitor = HealthMonitor::new(3, Duration::from_millis(10));

    let status = monitor.run(&client, |_| {}).await;

    assert_eq!(status, HealthStatus::Offline);
    assert_eq!(server.state.hit_count("GET /health").await, 3);
}

#[tokio::test]
async fn health_monitor_treats_connection_errors_as_failed_attempts() {
    let client = BackendClient::new(&unreachable_origin().await);
    let monitor = HealthMonitor::new(3, Duration::from_millis(5));

    let mut attempts = 0;
    let status = monitor.run(&client, |_| attempts += 1).await;

    assert_eq!(status, HealthStatus::Offline);
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn failed_health_probe_reports_its_status() {
    let server = spawn_mock_backend(MockState::with_health(vec![StatusCode::SERVICE_UNAVAILABLE])).await;
    let client = BackendClient::new(&server.url);

    match client.health().await.unwrap_err() {
        ClientError::Http { status, detail } => {
            assert_eq!(status.as_u16(), 503);
            assert!(detail.starts_with("health check returned 503"), "{detail}");
            assert!(!detail.contains("Upload failed"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
}
