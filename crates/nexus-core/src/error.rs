use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between the user pressing a key and the
/// backend answering. All variants are recovered at the controller.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unsupported file type. Please upload PDF, DOCX, TXT, or Image.")]
    UnsupportedFileType {
        file_name: String,
        content_type: Option<String>,
    },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: &'static str },
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },
    #[error("cannot connect to backend at {base_url}: {source}")]
    Network {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no active session; upload a document first")]
    NoSession,
    #[error("a {0} request is already in flight")]
    RequestInFlight(&'static str),
    #[error("backend returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
