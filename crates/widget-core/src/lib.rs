//! Core widget contract shared between the session runtime and UI consumers.
//!
//! This crate defines the command/event protocol, the transcript message
//! model, the inbound event normalizer, the session lifecycle model, and the
//! common error/channel abstractions.

/// Async command/event channel primitives.
pub mod channel;
/// Stable widget error types and surface classification.
pub mod error;
/// Inbound transport event normalization.
pub mod normalize;
/// Session lifecycle state machine and derived session facts.
pub mod session;
/// Ordered, identity-keyed transcript store.
pub mod transcript;
/// Frontend-facing protocol types (commands, events, message model).
pub mod types;

pub use channel::{EventStream, WidgetChannelError, WidgetChannels};
pub use error::{ErrorCategory, ErrorSurface, WidgetError};
pub use normalize::{
    ADAPTIVE_CARD_CONTENT_TYPE, Normalized, Signal, normalize_event, normalize_typing_event,
};
pub use session::Session;
pub use transcript::{TranscriptStore, Upsert};
pub use types::{
    AgentIdentity, AgentKind, Attachment, Message, MessageOrigin, OutgoingAttachment,
    PendingTransfer, QueueInfo, QueueUpdate, QuickReply, SessionState, WidgetCommand, WidgetEvent,
};
