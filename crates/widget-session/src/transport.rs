//! Transport seam between the session runtime and a live-chat backend.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use widget_core::{ErrorCategory, WidgetError};

/// Failure reported by a transport operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("session start failed: {0}")]
    Connect(String),
    #[error("message send failed: {0}")]
    Send(String),
    #[error("attachment upload failed: {0}")]
    Upload(String),
    #[error("attachment download failed: {0}")]
    Download(String),
    #[error("transcript email failed: {0}")]
    Email(String),
    #[error("session teardown failed: {0}")]
    Teardown(String),
}

impl TransportError {
    /// Map to the stable error payload emitted over the event stream.
    pub fn to_widget_error(&self) -> WidgetError {
        let (category, code) = match self {
            Self::Connect(_) => (ErrorCategory::Connection, "session_start_failed"),
            Self::Send(_) => (ErrorCategory::Send, "message_send_failed"),
            Self::Upload(_) => (ErrorCategory::Attachment, "attachment_upload_failed"),
            Self::Download(_) => (ErrorCategory::Attachment, "attachment_download_failed"),
            Self::Email(_) => (ErrorCategory::Send, "transcript_email_failed"),
            Self::Teardown(_) => (ErrorCategory::Connection, "session_teardown_failed"),
        };
        WidgetError::new(category, code, self.to_string())
    }
}

/// Black-box live-chat transport.
///
/// Inbound traffic arrives as raw JSON payloads on the two subscription
/// channels; the runtime owns normalization. Implementations must be safe to
/// share behind an `Arc` across the runtime and its hydration tasks.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Establish the chat session.
    async fn start_session(&self) -> Result<(), TransportError>;

    /// Send one already-serialized message body.
    async fn send_message(&self, body: &str) -> Result<(), TransportError>;

    /// Upload file bytes, returning the transport-side attachment id.
    async fn upload_attachment(
        &self,
        name: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String, TransportError>;

    /// Fetch attachment content by transport-side id, returning a usable
    /// content reference.
    async fn download_attachment(&self, remote_id: &str) -> Result<String, TransportError>;

    /// Ask the backend to email the transcript to `address`.
    async fn email_transcript(&self, address: &str) -> Result<(), TransportError>;

    /// Tear the session down.
    async fn end_session(&self) -> Result<(), TransportError>;

    /// Raw inbound message payloads.
    fn subscribe_messages(&self) -> broadcast::Receiver<Value>;

    /// Raw inbound typing payloads.
    fn subscribe_typing(&self) -> broadcast::Receiver<Value>;
}
