//! UI-agnostic application state types
//!
//! Session, uploaded files and the chat transcript. Nothing here is persisted:
//! a fresh process starts with no session and an empty transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier used to find a message again (only the typing placeholder is ever removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    /// Transient "bot is typing" placeholder.
    Typing,
}

/// A chat message in the document conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub kind: MessageKind,
    /// Plain text for users, Markdown for the assistant.
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_typing(&self) -> bool {
        self.kind == MessageKind::Typing
    }
}

/// Ordered chat history with wall-clock derived ids.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    last_id: i64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Millisecond timestamp, bumped past the previous id when two messages
    /// land in the same millisecond.
    fn next_id(&mut self, now: DateTime<Utc>) -> MessageId {
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        MessageId(id)
    }

    fn push(&mut self, role: ChatRole, kind: MessageKind, content: String) -> MessageId {
        let now = Utc::now();
        let id = self.next_id(now);
        self.messages.push(ChatMessage {
            id,
            role,
            kind,
            content,
            sent_at: now,
        });
        id
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        self.push(ChatRole::User, MessageKind::Text, content.into())
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> MessageId {
        self.push(ChatRole::Assistant, MessageKind::Text, content.into())
    }

    pub fn push_typing(&mut self) -> MessageId {
        self.push(ChatRole::Assistant, MessageKind::Typing, String::new())
    }

    /// Remove a message by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() != before
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}

/// How the backend classified an ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    Image,
    Document,
    Other(String),
}

impl Modality {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Modality::Image,
            "document" | "text" => Modality::Document,
            _ => Modality::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Modality::Image => "image",
            Modality::Document => "document",
            Modality::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub modality: Modality,
    pub chunks: Option<u64>,
}

/// The single active backend session plus everything uploaded into it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session_id: Option<String>,
    files: Vec<UploadedFile>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.session_id.is_some()
    }

    /// Only one document session is supported; a new upload replaces the old id.
    pub fn activate(&mut self, session_id: String) {
        self.session_id = Some(session_id);
    }

    pub fn add_file(&mut self, file: UploadedFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn file_count_label(&self) -> String {
        let count = self.files.len();
        format!("{} file{}", count, if count == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_are_strictly_increasing_within_one_millisecond() {
        let mut transcript = Transcript::new();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let a = transcript.next_id(now);
        let b = transcript.next_id(now);
        let c = transcript.next_id(now);
        assert!(a < b && b < c);
        assert_eq!(a, MessageId(1_700_000_000_000));
    }

    #[test]
    fn ids_follow_the_clock_when_it_moves_forward() {
        let mut transcript = Transcript::new();
        let first = transcript.next_id(Utc.timestamp_millis_opt(1_000).unwrap());
        let later = transcript.next_id(Utc.timestamp_millis_opt(5_000).unwrap());
        assert_eq!(first, MessageId(1_000));
        assert_eq!(later, MessageId(5_000));
    }

    #[test]
    fn removing_typing_placeholder_keeps_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        let typing = transcript.push_typing();
        assert!(transcript.last().unwrap().is_typing());

        assert!(transcript.remove(typing));
        assert!(!transcript.remove(typing));
        transcript.push_assistant("hi there");

        let roles: Vec<ChatRole> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert!(!transcript.contains(typing));
    }

    #[test]
    fn file_count_label_pluralizes() {
        let mut session = SessionState::new();
        assert_eq!(session.file_count_label(), "0 files");
        session.add_file(UploadedFile {
            name: "a.pdf".into(),
            modality: Modality::Document,
            chunks: None,
        });
        assert_eq!(session.file_count_label(), "1 file");
        session.add_file(UploadedFile {
            name: "b.png".into(),
            modality: Modality::Image,
            chunks: None,
        });
        assert_eq!(session.file_count_label(), "2 files");
    }

    #[test]
    fn activate_overwrites_previous_session() {
        let mut session = SessionState::new();
        assert!(!session.is_active());
        session.activate("first".into());
        session.activate("second".into());
        assert_eq!(session.session_id(), Some("second"));
    }

    #[test]
    fn modality_parsing() {
        assert_eq!(Modality::parse("image"), Modality::Image);
        assert_eq!(Modality::parse("Document"), Modality::Document);
        assert_eq!(Modality::parse("audio"), Modality::Other("audio".into()));
        assert_eq!(Modality::parse("audio").as_str(), "audio");
    }
}
