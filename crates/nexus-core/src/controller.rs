//! The client controller: owns session, transcript and upload progress, and
//! turns backend outcomes into user-visible state.
//!
//! Transitions are synchronous so an event loop can drive them while the
//! actual requests run elsewhere; [`Controller::upload`] and
//! [`Controller::ask`] chain them around the network calls for headless use.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::client::{BackendClient, IngestResponse};
use crate::error::{ClientError, ClientResult};
use crate::health::HealthStatus;
use crate::state::{MessageId, Modality, SessionState, Transcript, UploadedFile};
use crate::upload::UploadFile;

pub const UPLOAD_STARTED_PERCENT: u16 = 30;
pub const UPLOAD_RESPONSE_PERCENT: u16 = 80;
pub const UPLOAD_DONE_PERCENT: u16 = 100;

const COMPLETED_LINGER: Duration = Duration::from_secs(1);
const FAILED_LINGER: Duration = Duration::from_secs(3);

pub const UPLOADING_STATUS: &str = "Uploading & Indexing... (First upload may take 2-3 minutes)";
pub const NO_SESSION_NOTICE: &str = "Please upload a document to start the conversation.";
pub const NO_SESSION_MESSAGE: &str =
    "⚠️ Please upload a document or image first so I have something to talk about!";
pub const QUERY_TIMEOUT_MESSAGE: &str =
    "⏱️ Request timed out. The server might be busy or loading models. Please try again.";
pub const QUERY_FAILED_MESSAGE: &str =
    "❌ Sorry, I encountered an error while processing your request.";
pub const UPLOAD_TIMEOUT_MESSAGE: &str =
    "Request timed out. The server might be loading models (cold start). Please try again in a minute.";
pub const UPLOAD_BUSY_MESSAGE: &str = "An upload is already in progress. Please wait for it to finish.";
pub const RESET_BUSY_MESSAGE: &str =
    "Please wait for the current request to finish before clearing the session.";
pub const SESSION_CLEARED_MESSAGE: &str = "Session cleared. Upload a document to start again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A modal alert the UI shows until the user dismisses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadView {
    Idle,
    InProgress { file_name: String, percent: u16 },
    Completed { file_name: String, since: Instant },
    Failed { file_name: String, since: Instant },
}

impl UploadView {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, UploadView::InProgress { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, UploadView::Idle)
    }

    pub fn percent(&self) -> Option<u16> {
        match self {
            UploadView::Idle => None,
            UploadView::InProgress { percent, .. } => Some(*percent),
            UploadView::Completed { .. } => Some(UPLOAD_DONE_PERCENT),
            UploadView::Failed { .. } => Some(0),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            UploadView::Idle => None,
            UploadView::InProgress { file_name, .. }
            | UploadView::Completed { file_name, .. }
            | UploadView::Failed { file_name, .. } => Some(file_name),
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            UploadView::Idle => "",
            UploadView::InProgress { .. } => UPLOADING_STATUS,
            UploadView::Completed { .. } => "Completed!",
            UploadView::Failed { .. } => "Failed",
        }
    }
}

/// Everything needed to send one query and to clean up after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub question: String,
    pub session_id: String,
    pub typing_id: MessageId,
}

pub struct Controller {
    client: BackendClient,
    session: SessionState,
    transcript: Transcript,
    upload: UploadView,
    health: HealthStatus,
    notices: VecDeque<Notice>,
    query_in_flight: bool,
}

impl Controller {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            session: SessionState::new(),
            transcript: Transcript::new(),
            upload: UploadView::Idle,
            health: HealthStatus::Checking,
            notices: VecDeque::new(),
            query_in_flight: false,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn upload_view(&self) -> &UploadView {
        &self.upload
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    pub fn set_health(&mut self, status: HealthStatus) {
        self.health = status;
    }

    /// The send control is disabled while this is true.
    pub fn is_query_in_flight(&self) -> bool {
        self.query_in_flight
    }

    pub fn show_connection_warning(&self) -> bool {
        self.health == HealthStatus::Offline
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            text: text.into(),
        });
    }

    pub fn current_notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Forget the session, its files, the transcript and pending notices.
    /// Refused while a request is in flight so a late result cannot land in
    /// the fresh state. Health is kept: the backend has not changed.
    pub fn reset(&mut self) -> ClientResult<()> {
        if self.upload.is_in_progress() || self.query_in_flight {
            self.notify(NoticeLevel::Warning, RESET_BUSY_MESSAGE);
            return Err(ClientError::RequestInFlight("reset"));
        }

        self.session = SessionState::new();
        self.transcript = Transcript::new();
        self.upload = UploadView::Idle;
        self.notices.clear();
        info!("session cleared");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Upload pipeline
    // ------------------------------------------------------------------

    /// Validate `file` and move the upload view to its first progress step.
    /// On error nothing must be sent.
    pub fn begin_upload(&mut self, file: &UploadFile) -> ClientResult<()> {
        if self.upload.is_in_progress() {
            self.notify(NoticeLevel::Error, UPLOAD_BUSY_MESSAGE);
            return Err(ClientError::RequestInFlight("upload"));
        }

        if let Err(e) = file.validate() {
            info!(file = %file.name, content_type = ?file.content_type, "rejected unsupported file");
            self.notify(NoticeLevel::Error, e.to_string());
            return Err(e);
        }

        self.upload = UploadView::InProgress {
            file_name: file.name.clone(),
            percent: UPLOAD_STARTED_PERCENT,
        };
        Ok(())
    }

    pub fn upload_response_received(&mut self) {
        if let UploadView::InProgress { percent, .. } = &mut self.upload {
            *percent = UPLOAD_RESPONSE_PERCENT;
        }
    }

    /// Apply the outcome of an upload. Returns true on success.
    pub fn complete_upload(&mut self, file_name: &str, result: ClientResult<IngestResponse>) -> bool {
        let since = Instant::now();
        match result {
            Ok(ingest) => {
                self.session.activate(ingest.session_id);
                self.session.add_file(UploadedFile {
                    name: file_name.to_string(),
                    modality: Modality::parse(&ingest.modality),
                    chunks: ingest.chunks,
                });
                self.transcript.push_assistant(format!(
                    "I've successfully processed **{}**. You can now ask questions about it!",
                    file_name
                ));
                self.upload = UploadView::Completed {
                    file_name: file_name.to_string(),
                    since,
                };
                true
            }
            Err(e) => {
                error!(file = file_name, error = %e, "upload failed");
                let message = upload_failure_message(&e, self.client.base_url());
                self.notify(NoticeLevel::Error, message);
                self.upload = UploadView::Failed {
                    file_name: file_name.to_string(),
                    since,
                };
                false
            }
        }
    }

    /// Return a finished upload view to idle once it has been visible long enough.
    pub fn tick(&mut self, now: Instant) {
        let expired = match &self.upload {
            UploadView::Completed { since, .. } => now.duration_since(*since) >= COMPLETED_LINGER,
            UploadView::Failed { since, .. } => now.duration_since(*since) >= FAILED_LINGER,
            _ => false,
        };
        if expired {
            self.upload = UploadView::Idle;
        }
    }

    pub async fn upload(&mut self, file: &UploadFile) -> bool {
        if self.begin_upload(file).is_err() {
            return false;
        }

        let client = self.client.clone();
        let result = match client.post_ingest(file).await {
            Ok(response) => {
                self.upload_response_received();
                client.parse_ingest(response).await
            }
            Err(e) => Err(e),
        };

        self.complete_upload(&file.name, result)
    }

    // ------------------------------------------------------------------
    // Query pipeline
    // ------------------------------------------------------------------

    /// Record the user's question and the typing placeholder. `None` means
    /// nothing should be sent.
    pub fn begin_query(&mut self, text: &str) -> Option<QueryTicket> {
        let question = text.trim();
        if question.is_empty() {
            return None;
        }

        if self.query_in_flight {
            debug!("query ignored, another one is in flight");
            return None;
        }

        let Some(session_id) = self.session.session_id().map(str::to_string) else {
            self.notify(NoticeLevel::Warning, NO_SESSION_NOTICE);
            self.transcript.push_assistant(NO_SESSION_MESSAGE);
            return None;
        };

        self.transcript.push_user(question);
        let typing_id = self.transcript.push_typing();
        self.query_in_flight = true;

        Some(QueryTicket {
            question: question.to_string(),
            session_id,
            typing_id,
        })
    }

    pub fn complete_query(&mut self, ticket: QueryTicket, result: ClientResult<String>) {
        self.transcript.remove(ticket.typing_id);

        match result {
            Ok(answer) => {
                self.transcript.push_assistant(answer);
            }
            Err(e) => {
                error!(error = %e, "query failed");
                self.transcript.push_assistant(query_failure_message(&e));
            }
        }

        self.query_in_flight = false;
    }

    pub async fn ask(&mut self, text: &str) -> bool {
        let Some(ticket) = self.begin_query(text) else {
            return false;
        };

        let result = self.client.query(&ticket.question, &ticket.session_id).await;
        let ok = result.is_ok();
        self.complete_query(ticket, result);
        ok
    }
}

pub fn upload_failure_message(error: &ClientError, base_url: &str) -> String {
    match error {
        ClientError::Timeout { .. } => UPLOAD_TIMEOUT_MESSAGE.to_string(),
        ClientError::Network { .. } => format!(
            "Cannot connect to backend. Please ensure the backend is running at {}",
            base_url
        ),
        ClientError::RequestInFlight(_) => UPLOAD_BUSY_MESSAGE.to_string(),
        other => other.to_string(),
    }
}

pub fn query_failure_message(error: &ClientError) -> &'static str {
    if error.is_timeout() {
        QUERY_TIMEOUT_MESSAGE
    } else {
        QUERY_FAILED_MESSAGE
    }
}
