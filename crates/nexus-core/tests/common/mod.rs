#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: String,
}

impl MockReply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub health_statuses: Arc<Mutex<VecDeque<StatusCode>>>,
    pub ingest_reply: Arc<Mutex<MockReply>>,
    pub query_reply: Arc<Mutex<MockReply>>,
    pub ingest_delay: Duration,
    pub query_delay: Duration,
    pub hits: Arc<Mutex<Vec<String>>>,
    pub uploads: Arc<Mutex<Vec<SeenUpload>>>,
    pub queries: Arc<Mutex<Vec<Value>>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            health_statuses: Arc::new(Mutex::new(VecDeque::new())),
            ingest_reply: Arc::new(Mutex::new(MockReply::json(
                StatusCode::OK,
                json!({"status": "success", "session_id": "abc123", "modality": "document", "chunks": 3}),
            ))),
            query_reply: Arc::new(Mutex::new(MockReply::json(
                StatusCode::OK,
                json!({"answer": "The report covers **Q3 revenue**."}),
            ))),
            ingest_delay: Duration::ZERO,
            query_delay: Duration::ZERO,
            hits: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockState {
    pub fn with_health(statuses: Vec<StatusCode>) -> Self {
        Self {
            health_statuses: Arc::new(Mutex::new(VecDeque::from(statuses))),
            ..Self::default()
        }
    }

    pub fn with_ingest(reply: MockReply) -> Self {
        Self {
            ingest_reply: Arc::new(Mutex::new(reply)),
            ..Self::default()
        }
    }

    pub fn with_query(reply: MockReply) -> Self {
        Self {
            query_reply: Arc::new(Mutex::new(reply)),
            ..Self::default()
        }
    }

    pub async fn hits(&self) -> Vec<String> {
        self.hits.lock().await.clone()
    }

    pub async fn hit_count(&self, route: &str) -> usize {
        self.hits.lock().await.iter().filter(|h| h.as_str() == route).count()
    }
}

/// In-process backend stand-in. Aborted on drop so a handler that is still
/// sleeping cannot keep the test alive.
pub struct MockServer {
    pub url: String,
    pub state: MockState,
    task: JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_mock_backend(state: MockState) -> MockServer {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/warmup", get(warmup_handler))
        .route("/ingest/file", post(ingest_handler))
        .route("/query", post(query_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");

    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend should run");
    });

    MockServer {
        url: format!("http://{local_addr}"),
        state,
        task,
    }
}

/// An origin nothing listens on.
pub async fn unreachable_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("address should resolve");
    drop(listener);
    format!("http://{addr}")
}

fn respond(reply: MockReply) -> impl IntoResponse {
    (
        reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
}

async fn health_handler(State(state): State<MockState>) -> StatusCode {
    state.hits.lock().await.push("GET /health".to_string());
    state
        .health_statuses
        .lock()
        .await
        .pop_front()
        .unwrap_or(StatusCode::OK)
}

async fn warmup_handler(State(state): State<MockState>) -> Json<Value> {
    state.hits.lock().await.push("GET /warmup".to_string());
    Json(json!({"status": "models warmed up"}))
}

async fn ingest_handler(State(state): State<MockState>, mut multipart: Multipart) -> impl IntoResponse {
    state.hits.lock().await.push("POST /ingest/file".to_string());

    while let Ok(Some(field)) = multipart.next_field().await {
        let seen = SeenUpload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            size: 0,
        };
        let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
        state.uploads.lock().await.push(SeenUpload { size, ..seen });
    }

    if !state.ingest_delay.is_zero() {
        tokio::time::sleep(state.ingest_delay).await;
    }

    respond(state.ingest_reply.lock().await.clone())
}

async fn query_handler(State(state): State<MockState>, Json(payload): Json<Value>) -> impl IntoResponse {
    state.hits.lock().await.push("POST /query".to_string());
    state.queries.lock().await.push(payload);

    if !state.query_delay.is_zero() {
        tokio::time::sleep(state.query_delay).await;
    }

    respond(state.query_reply.lock().await.clone())
}
