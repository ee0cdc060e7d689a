pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod state;
pub mod upload;

// Re-export main types for convenience
pub use client::{BackendClient, IngestResponse};
pub use config::Config;
pub use controller::{Controller, Notice, NoticeLevel, QueryTicket, UploadView};
pub use error::{ClientError, ClientResult};
pub use health::{HealthMonitor, HealthStatus};
pub use state::{ChatMessage, ChatRole, MessageId, MessageKind, Modality, SessionState, Transcript, UploadedFile};
pub use upload::UploadFile;
