use std::path::PathBuf;
use std::time::Instant;

use nexus_core::controller::SESSION_CLEARED_MESSAGE;
use nexus_core::{Controller, HealthMonitor, HealthStatus, NoticeLevel, UploadFile};
use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::tui::{AppEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a question.
    Editing,
    /// Typing the path of a file to upload.
    UploadPath,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    /// "Clear session?" confirmation is showing.
    pub confirm_reset: bool,
    pub controller: Controller,

    // Question input
    pub query_input: String,
    pub query_cursor: usize,

    // Upload path prompt
    pub upload_input: String,
    pub upload_cursor: usize,

    // Chat viewport
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub health_attempt: u32,
    pub monitor: HealthMonitor,

    events: EventSender,
}

impl App {
    pub fn new(controller: Controller, monitor: HealthMonitor, events: EventSender) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            confirm_reset: false,
            controller,
            query_input: String::new(),
            query_cursor: 0,
            upload_input: String::new(),
            upload_cursor: 0,
            chat_scroll: 0,
            follow_tail: true,
            chat_area: None,
            animation_frame: 0,
            health_attempt: 0,
            monitor,
            events,
        }
    }

    /// Kick off health polling and the warmup request side by side.
    pub fn start_background(&self) {
        let client = self.controller.client().clone();
        let monitor = self.monitor;
        let tx = self.events.clone();
        tokio::spawn(async move {
            let status = monitor
                .run(&client, |attempt| {
                    let _ = tx.send(AppEvent::HealthAttempt(attempt));
                })
                .await;
            let _ = tx.send(AppEvent::Health(status));
        });

        let client = self.controller.client().clone();
        tokio::spawn(async move {
            info!("warming up backend models");
            match client.warmup().await {
                Ok(()) => info!("backend models warmed up"),
                Err(e) => debug!(error = %e, "model warmup skipped"),
            }
        });
    }

    pub fn submit_query(&mut self) {
        let Some(ticket) = self.controller.begin_query(&self.query_input) else {
            self.follow_tail = true;
            return;
        };

        self.query_input.clear();
        self.query_cursor = 0;
        self.follow_tail = true;

        let client = self.controller.client().clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.query(&ticket.question, &ticket.session_id).await;
            let _ = tx.send(AppEvent::QueryFinished { ticket, result });
        });
    }

    pub fn open_upload_prompt(&mut self) {
        self.upload_input.clear();
        self.upload_cursor = 0;
        self.input_mode = InputMode::UploadPath;
    }

    pub fn submit_upload(&mut self) {
        let path = clean_dropped_path(&self.upload_input);
        self.input_mode = InputMode::Editing;
        if path.as_os_str().is_empty() {
            return;
        }

        let file = UploadFile::from_path(&path);
        if self.controller.begin_upload(&file).is_err() {
            return;
        }

        let client = self.controller.client().clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = match client.post_ingest(&file).await {
                Ok(response) => {
                    let _ = tx.send(AppEvent::UploadResponseReceived);
                    client.parse_ingest(response).await
                }
                Err(e) => Err(e),
            };
            let _ = tx.send(AppEvent::UploadFinished {
                file_name: file.name.clone(),
                result,
            });
        });
    }

    pub fn request_reset(&mut self) {
        self.confirm_reset = true;
    }

    pub fn cancel_reset(&mut self) {
        self.confirm_reset = false;
    }

    /// Start over with no session, files or chat history.
    pub fn confirm_reset_session(&mut self) {
        self.confirm_reset = false;
        if self.controller.reset().is_err() {
            return;
        }

        self.query_input.clear();
        self.query_cursor = 0;
        self.upload_input.clear();
        self.upload_cursor = 0;
        self.chat_scroll = 0;
        self.follow_tail = true;
        self.input_mode = InputMode::Editing;
        self.controller.notify(NoticeLevel::Info, SESSION_CLEARED_MESSAGE);
    }

    /// Apply a result posted back by a background task.
    pub fn apply_backend_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::HealthAttempt(attempt) => self.health_attempt = attempt,
            AppEvent::Health(status) => self.controller.set_health(status),
            AppEvent::UploadResponseReceived => self.controller.upload_response_received(),
            AppEvent::UploadFinished { file_name, result } => {
                if self.controller.complete_upload(&file_name, result) {
                    self.follow_tail = true;
                }
            }
            AppEvent::QueryFinished { ticket, result } => {
                self.controller.complete_query(ticket, result);
                self.follow_tail = true;
            }
            AppEvent::Key(_) | AppEvent::Mouse(_) | AppEvent::Resize(_, _) | AppEvent::Tick => {}
        }
    }

    pub fn tick(&mut self) {
        if self.controller.is_query_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.controller.tick(Instant::now());
    }

    pub fn health_label(&self) -> String {
        match self.controller.health() {
            HealthStatus::Checking if self.health_attempt > 0 => format!(
                "{} ({}/{})",
                HealthStatus::Checking.label(),
                self.health_attempt,
                self.monitor.retries
            ),
            status => status.label().to_string(),
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_tail = false;
        self.chat_scroll = 0;
    }
}

/// Terminals paste dropped files as quoted or backslash-escaped paths.
pub fn clean_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.replace("\\ ", " "));
    PathBuf::from(unquoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::BackendClient;
    use tokio::sync::mpsc;

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Controller::new(BackendClient::new("http://127.0.0.1:9"));
        let monitor = HealthMonitor::new(10, std::time::Duration::from_millis(2000));
        (App::new(controller, monitor, tx), rx)
    }

    #[test]
    fn dropped_paths_are_unquoted() {
        assert_eq!(clean_dropped_path("  '/tmp/my report.pdf' "), PathBuf::from("/tmp/my report.pdf"));
        assert_eq!(clean_dropped_path("\"/tmp/a b.txt\""), PathBuf::from("/tmp/a b.txt"));
        assert_eq!(clean_dropped_path("/tmp/my\\ report.pdf"), PathBuf::from("/tmp/my report.pdf"));
        assert_eq!(clean_dropped_path("/tmp/plain.png"), PathBuf::from("/tmp/plain.png"));
    }

    #[test]
    fn question_without_session_keeps_input() {
        let (mut app, mut rx) = app();
        app.query_input = "hello?".into();
        app.submit_query();

        assert_eq!(app.query_input, "hello?");
        assert!(rx.try_recv().is_err());
        assert!(app.controller.current_notice().is_some());
    }

    #[test]
    fn unsupported_upload_spawns_nothing() {
        let (mut app, mut rx) = app();
        app.open_upload_prompt();
        app.upload_input = "/tmp/archive.zip".into();
        app.submit_upload();

        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(app.controller.upload_view().is_idle());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn health_label_shows_attempts_while_checking() {
        let (mut app, _rx) = app();
        assert_eq!(app.health_label(), "Connecting");
        app.apply_backend_event(AppEvent::HealthAttempt(3));
        assert_eq!(app.health_label(), "Connecting (3/10)");
        app.apply_backend_event(AppEvent::Health(HealthStatus::Offline));
        assert_eq!(app.health_label(), "Offline");
        assert!(app.controller.show_connection_warning());
    }

    #[test]
    fn confirmed_reset_starts_over() {
        let (mut app, _rx) = app();
        app.query_input = "draft".into();
        app.query_cursor = 5;
        app.controller.notify(NoticeLevel::Warning, "old");

        app.request_reset();
        assert!(app.confirm_reset);
        app.confirm_reset_session();

        assert!(!app.confirm_reset);
        assert!(app.query_input.is_empty());
        assert_eq!(app.query_cursor, 0);
        assert!(app.controller.transcript().is_empty());
        let notice = app.controller.current_notice().unwrap();
        assert_eq!(notice.text, SESSION_CLEARED_MESSAGE);
    }

    #[test]
    fn cancelled_reset_keeps_everything() {
        let (mut app, _rx) = app();
        app.query_input = "draft".into();
        app.request_reset();
        app.cancel_reset();

        assert!(!app.confirm_reset);
        assert_eq!(app.query_input, "draft");
    }
}
