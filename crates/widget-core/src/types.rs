use serde::{Deserialize, Serialize};

use crate::error::WidgetError;

/// High-level session lifecycle state reported to the frontend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// No session is active. Initial and terminal state.
    Idle,
    /// A session start request is in flight.
    Connecting,
    /// Transport session is established and messages flow.
    Connected,
}

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageOrigin {
    /// The end user of the widget.
    User,
    /// Anything else the transport delivers (bot, human agent, system).
    Agent,
}

/// Bot-vs-human classification for agent-origin messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AgentKind {
    Bot,
    Human,
}

/// Display identity of the agent behind a message.
///
/// Only present when the transport supplied a display name that passed the
/// placeholder-name filter; see [`crate::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    pub name: String,
    pub kind: AgentKind,
}

/// File attachment carried by a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Display file name.
    pub name: String,
    /// MIME content type, for example `image/png`.
    pub mime_type: String,
    /// Reported size in bytes. Zero when the transport did not say.
    pub size_bytes: u64,
    /// Directly usable content reference (URL or local object handle).
    pub content_ref: Option<String>,
    /// Transport-side identifier used to fetch the content later.
    pub remote_id: Option<String>,
}

impl Attachment {
    /// Whether the content still has to be fetched from the transport.
    pub fn needs_hydration(&self) -> bool {
        self.content_ref.is_none() && self.remote_id.is_some()
    }
}

/// Transient transfer state of a message's attachment.
///
/// Upload and download are mutually exclusive; the flag is cleared when the
/// transfer completes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PendingTransfer {
    Uploading,
    Downloading,
}

/// Predefined response option rendered as a button.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuickReply {
    /// Button label shown to the user.
    pub label: String,
    /// Payload sent verbatim as a user message when selected.
    pub value: String,
}

/// Canonical transcript entry produced by the normalizer or by sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable identity used for upsert matching.
    pub id: String,
    pub origin: MessageOrigin,
    /// Plain/markdown display text. May be empty for card-only messages.
    pub text: String,
    /// Arrival timestamp in milliseconds since Unix epoch. Display order
    /// follows transcript insertion order, not this value.
    pub timestamp_ms: u64,
    /// Display-worthy agent identity, agent-origin messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_identity: Option<AgentIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// In-flight attachment transfer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingTransfer>,
    /// Set when the transport rejected the send of this optimistic message.
    #[serde(default)]
    pub send_failed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
    /// Opaque structured-content payload rendered by an external collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_card: Option<serde_json::Value>,
}

impl Message {
    /// Build a plain user-origin message, as appended optimistically on send.
    pub fn user_text(id: impl Into<String>, text: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            id: id.into(),
            origin: MessageOrigin::User,
            text: text.into(),
            timestamp_ms,
            agent_identity: None,
            attachment: None,
            pending: None,
            send_failed: false,
            quick_replies: Vec::new(),
            structured_card: None,
        }
    }
}

/// Queue status derived from system messages while waiting for an agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    /// Position in the waiting queue, when reported.
    pub position: Option<u32>,
    /// Estimated wait in seconds, when reported.
    pub estimated_wait_secs: Option<u32>,
}

/// Partial queue-status extraction from a single system message.
///
/// Fields that did not match stay `None` and leave the session value alone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueUpdate {
    pub position: Option<u32>,
    pub estimated_wait_secs: Option<u32>,
}

impl QueueUpdate {
    /// Whether the extraction produced no fact at all.
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.estimated_wait_secs.is_none()
    }
}

/// Outgoing file attachment supplied by the UI for upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingAttachment {
    pub name: String,
    pub mime_type: String,
    /// Raw file bytes handed to the transport.
    pub data: Vec<u8>,
    /// Local preview handle shown while the upload is in flight.
    pub preview_ref: Option<String>,
}

/// Command channel input accepted by the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WidgetCommand {
    /// Start a chat session (manual start or auto-connect trigger).
    Start,
    /// Send a plain text message.
    SendText {
        /// Message body.
        text: String,
    },
    /// Send a structured-card submission.
    SubmitCardData {
        /// Opaque submission payload forwarded to the transport.
        data: serde_json::Value,
        /// Optional action label used in the optimistic transcript summary.
        action_title: Option<String>,
    },
    /// Upload a file attachment.
    UploadAttachment {
        /// File content and metadata.
        upload: OutgoingAttachment,
    },
    /// Ask the transport to email the session transcript.
    EmailTranscript {
        /// Destination address.
        address: String,
    },
    /// End the session and tear down transport state.
    End,
}

/// Event channel output emitted by the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WidgetEvent {
    /// Session lifecycle transition.
    StateChanged {
        /// New lifecycle state.
        state: SessionState,
    },
    /// A transcript entry was inserted or replaced in place.
    MessageUpserted {
        /// Full message after the upsert.
        message: Message,
    },
    /// A failed optimistic upload was removed from the transcript.
    MessageRemoved {
        /// Identity of the removed message.
        id: String,
    },
    /// The transcript was emptied.
    TranscriptCleared,
    /// Agent typing indicator changed.
    TypingChanged { typing: bool },
    /// Queue status changed; `None` means the queue banner should go away.
    QueueInfoChanged { queue_info: Option<QueueInfo> },
    /// The identified agent serving this session changed.
    ActiveAgentChanged { agent: Option<AgentIdentity> },
    /// Follow-up suggestion chips for the latest agent message; an empty
    /// list means any visible chips should go away.
    SuggestionsChanged { suggestions: Vec<String> },
    /// A user-facing error was raised; see its surface classification.
    ErrorRaised { error: WidgetError },
    /// A previously raised transient error timed out.
    ErrorCleared,
}
