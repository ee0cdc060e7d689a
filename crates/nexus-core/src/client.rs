use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::error::{ClientError, ClientResult};
use crate::upload::UploadFile;

pub const HEALTH_PATH: &str = "/health";
pub const WARMUP_PATH: &str = "/warmup";
pub const INGEST_PATH: &str = "/ingest/file";
pub const QUERY_PATH: &str = "/query";

const UPLOAD_FAILED_FALLBACK: &str = "Upload failed";
/// Bound on a single liveness probe so one stuck attempt cannot stall polling.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
    session_id: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: String,
}

/// Successful `/ingest/file` payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub session_id: String,
    pub modality: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chunks: Option<u64>,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    upload_timeout: Duration,
    query_timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: config::normalize_origin(base_url),
            upload_timeout: Duration::from_millis(config::DEFAULT_UPLOAD_TIMEOUT_MS),
            query_timeout: Duration::from_millis(config::DEFAULT_QUERY_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &Config, base_url: &str) -> Self {
        Self::new(base_url).with_timeouts(config.upload_timeout(), config.query_timeout())
    }

    pub fn with_timeouts(mut self, upload: Duration, query: Duration) -> Self {
        self.upload_timeout = upload;
        self.query_timeout = query;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport_error(&self, endpoint: &'static str, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            warn!(endpoint, "request deadline elapsed");
            ClientError::Timeout { endpoint }
        } else {
            ClientError::Network {
                base_url: self.base_url.clone(),
                source: err,
            }
        }
    }

    /// One liveness probe. Any 2xx counts as healthy.
    pub async fn health(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.map_transport_error(HEALTH_PATH, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Http {
                status,
                detail: format!("health check returned {}", status),
            })
        }
    }

    /// Ask the backend to load its models ahead of the first real request.
    pub async fn warmup(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(self.url(WARMUP_PATH))
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(WARMUP_PATH, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status,
                detail: format!("warmup returned {}", status),
            });
        }
        Ok(())
    }

    /// Send the file and hand back the raw response, whatever its status.
    /// The upload deadline keeps running until [`Self::parse_ingest`] has read the body.
    pub async fn post_ingest(&self, file: &UploadFile) -> ClientResult<Response> {
        let form = file.to_form().await?;

        info!(file = %file.name, content_type = ?file.content_type, "uploading file for ingestion");

        self.client
            .post(self.url(INGEST_PATH))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(INGEST_PATH, e))
    }

    pub async fn parse_ingest(&self, response: Response) -> ClientResult<IngestResponse> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(INGEST_PATH, e))?;

        if !status.is_success() {
            let detail = extract_error_detail(&body);
            warn!(%status, %detail, "ingestion failed");
            return Err(ClientError::Http { status, detail });
        }

        let ingest: IngestResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidPayload(e.to_string()))?;

        info!(
            session_id = %ingest.session_id,
            modality = %ingest.modality,
            chunks = ?ingest.chunks,
            "ingestion completed"
        );
        Ok(ingest)
    }

    pub async fn ingest_file(&self, file: &UploadFile) -> ClientResult<IngestResponse> {
        let response = self.post_ingest(file).await?;
        self.parse_ingest(response).await
    }

    pub async fn query(&self, question: &str, session_id: &str) -> ClientResult<String> {
        let request = QueryRequest { question, session_id };

        debug!(session_id, "sending query");

        let response = self
            .client
            .post(self.url(QUERY_PATH))
            .json(&request)
            .timeout(self.query_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(QUERY_PATH, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(QUERY_PATH, e))?;

        if !status.is_success() {
            let detail = extract_error_detail(&body);
            warn!(%status, %detail, "query failed");
            return Err(ClientError::Http { status, detail });
        }

        let query_response: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidPayload(e.to_string()))?;
        Ok(query_response.answer)
    }
}

/// Pull a human readable message out of an error body: the JSON `detail`
/// field if the body is JSON, otherwise the raw text, otherwise a generic
/// fallback.
pub fn extract_error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(detail @ (Value::Array(_) | Value::Object(_) | Value::Number(_))) => detail.to_string(),
            _ => UPLOAD_FAILED_FALLBACK.to_string(),
        },
        Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                UPLOAD_FAILED_FALLBACK.to_string()
            } else {
                text.to_string()
            }
        }
    }
}
