//! Single-task session runtime.
//!
//! One spawned task owns the transcript, the session state machine and the
//! transport handle. Commands arrive over the channel pair, raw transport
//! payloads arrive over the subscriptions, and hydration tasks report back
//! through an internal channel. Nothing outside this task mutates session
//! state, so every transcript update is applied in a single deterministic
//! order.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use widget_core::{
    Attachment, ErrorCategory, ErrorSurface, Message, MessageOrigin, Normalized,
    OutgoingAttachment, PendingTransfer, Session, SessionState, Signal, TranscriptStore,
    WidgetChannelError, WidgetChannels, WidgetCommand, WidgetError, WidgetEvent, normalize_event,
    normalize_typing_event,
};
use widget_host::{HostBridge, HostSignal};

use crate::suggestions::SuggestionSource;
use crate::transport::{ChatTransport, TransportError};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;
const INTERNAL_BUFFER: usize = 32;

/// Timing and upload policy for one runtime instance.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay before the one-shot auto-connect trigger fires.
    pub auto_connect_delay: Duration,
    /// Settle delay between transport teardown and the end-of-session host
    /// notification.
    pub end_grace_delay: Duration,
    /// How long a transient error stays visible.
    pub error_clear_delay: Duration,
    /// Upload size cap in bytes.
    pub upload_max_bytes: u64,
    /// MIME types accepted for upload.
    pub allowed_upload_mime_types: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            auto_connect_delay: Duration::from_millis(800),
            end_grace_delay: Duration::from_millis(300),
            error_clear_delay: Duration::from_millis(4000),
            upload_max_bytes: 5 * 1024 * 1024,
            allowed_upload_mime_types: vec![
                "application/pdf".to_owned(),
                "image/jpeg".to_owned(),
                "image/png".to_owned(),
            ],
        }
    }
}

/// Caller-side handle to a spawned session runtime.
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    channels: WidgetChannels,
}

impl WidgetHandle {
    pub async fn send(&self, command: WidgetCommand) -> Result<(), WidgetChannelError> {
        self.channels.send_command(command).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.channels.subscribe_events()
    }
}

/// Spawn the runtime task and hand back its channel handle.
pub fn spawn_runtime(
    transport: Arc<dyn ChatTransport>,
    host: Arc<dyn HostBridge>,
    suggestions: Arc<dyn SuggestionSource>,
    config: RuntimeConfig,
) -> WidgetHandle {
    let (channels, command_rx) = WidgetChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
    let runtime = SessionRuntime::new(
        channels.clone(),
        command_rx,
        transport,
        host,
        suggestions,
        config,
    );
    tokio::spawn(runtime.run());
    WidgetHandle { channels }
}

/// Messages the runtime sends itself from spawned helper tasks.
#[derive(Debug)]
enum InternalMsg {
    /// The one-shot auto-connect delay elapsed.
    AutoStart,
    /// A hydration task finished for message `id`.
    Hydrated {
        id: String,
        outcome: Result<String, TransportError>,
    },
    /// A transient-error display interval elapsed.
    ClearError { seq: u64 },
    /// A follow-up suggestion fetch finished for agent message `for_id`.
    FollowUps {
        for_id: String,
        suggestions: Vec<String>,
    },
}

struct SessionRuntime {
    channels: WidgetChannels,
    command_rx: mpsc::Receiver<WidgetCommand>,
    transport: Arc<dyn ChatTransport>,
    host: Arc<dyn HostBridge>,
    suggestions: Arc<dyn SuggestionSource>,
    config: RuntimeConfig,
    transcript: TranscriptStore,
    session: Session,
    agent_typing: bool,
    /// Agent message id the most recent suggestion fetch was spawned for;
    /// results for any other id are stale and dropped.
    pending_suggestions_for: Option<String>,
    suggestions_shown: bool,
    internal_tx: mpsc::Sender<InternalMsg>,
    internal_rx: mpsc::Receiver<InternalMsg>,
    auto_connect: CancellationToken,
    /// Sequence of the most recently raised transient error; stale clear
    /// timers are ignored by comparing against it.
    error_seq: u64,
}

impl SessionRuntime {
    fn new(
        channels: WidgetChannels,
        command_rx: mpsc::Receiver<WidgetCommand>,
        transport: Arc<dyn ChatTransport>,
        host: Arc<dyn HostBridge>,
        suggestions: Arc<dyn SuggestionSource>,
        config: RuntimeConfig,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_BUFFER);
        Self {
            channels,
            command_rx,
            transport,
            host,
            suggestions,
            config,
            transcript: TranscriptStore::new(),
            session: Session::new(),
            agent_typing: false,
            pending_suggestions_for: None,
            suggestions_shown: false,
            internal_tx,
            internal_rx,
            auto_connect: CancellationToken::new(),
            error_seq: 0,
        }
    }

    async fn run(mut self) {
        let mut messages = self.transport.subscribe_messages();
        let mut typing = self.transport.subscribe_typing();
        let mut messages_open = true;
        let mut typing_open = true;
        self.schedule_auto_connect();

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
                internal = self.internal_rx.recv() => {
                    if let Some(internal) = internal {
                        self.handle_internal(internal).await;
                    }
                }
                payload = messages.recv(), if messages_open => match payload {
                    Ok(payload) => self.handle_message_payload(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "inbound message stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("inbound message stream closed");
                        messages_open = false;
                    }
                },
                payload = typing.recv(), if typing_open => match payload {
                    Ok(payload) => self.handle_typing_payload(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "typing stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        typing_open = false;
                    }
                },
            }
        }
        debug!("session runtime stopped");
    }

    async fn handle_command(&mut self, command: WidgetCommand) {
        match command {
            WidgetCommand::Start => self.handle_start().await,
            WidgetCommand::SendText { text } => self.handle_send_text(text).await,
            WidgetCommand::SubmitCardData { data, action_title } => {
                self.handle_submit_card(data, action_title).await;
            }
            WidgetCommand::UploadAttachment { upload } => self.handle_upload(upload).await,
            WidgetCommand::EmailTranscript { address } => self.handle_email(address).await,
            WidgetCommand::End => self.handle_end().await,
        }
    }

    async fn handle_internal(&mut self, internal: InternalMsg) {
        match internal {
            InternalMsg::AutoStart => {
                if self.session.can_auto_connect() {
                    debug!("auto-connect trigger fired");
                    self.handle_start().await;
                } else {
                    trace!("auto-connect trigger skipped");
                }
            }
            InternalMsg::Hydrated { id, outcome } => self.apply_hydration(id, outcome),
            InternalMsg::ClearError { seq } => {
                if seq == self.error_seq {
                    self.channels.emit_event(WidgetEvent::ErrorCleared);
                }
            }
            InternalMsg::FollowUps {
                for_id,
                suggestions,
            } => {
                if self.pending_suggestions_for.as_deref() != Some(for_id.as_str()) {
                    trace!("stale follow-up result dropped");
                    return;
                }
                self.pending_suggestions_for = None;
                if !suggestions.is_empty() || self.suggestions_shown {
                    self.suggestions_shown = !suggestions.is_empty();
                    self.channels
                        .emit_event(WidgetEvent::SuggestionsChanged { suggestions });
                }
            }
        }
    }

    async fn handle_start(&mut self) {
        // An explicit start supersedes the pending auto-connect trigger.
        self.auto_connect.cancel();

        match self.session.begin_connect() {
            Ok(event) => self.channels.emit_event(event),
            Err(err) => {
                self.emit_error(err);
                return;
            }
        }

        match self.transport.start_session().await {
            Ok(()) => match self.session.connect_established() {
                Ok(event) => {
                    // A fresh session starts from an empty transcript; any
                    // pre-connection optimistic state is discarded.
                    if !self.transcript.is_empty() {
                        self.transcript.clear();
                        self.channels.emit_event(WidgetEvent::TranscriptCleared);
                    }
                    self.channels.emit_event(event);
                }
                Err(err) => self.emit_error(err),
            },
            Err(err) => {
                if let Ok(event) = self.session.connect_failed() {
                    self.channels.emit_event(event);
                }
                self.emit_error(err.to_widget_error());
            }
        }
    }

    async fn handle_send_text(&mut self, text: String) {
        if !self.require_connected("send") {
            return;
        }
        self.clear_suggestions();

        let message = Message::user_text(Uuid::new_v4().to_string(), text.clone(), now_ms());
        self.upsert_and_emit(message.clone());
        self.set_agent_typing(true);

        if let Err(err) = self.transport.send_message(&text).await {
            let mut failed = message;
            failed.send_failed = true;
            self.upsert_and_emit(failed);
            self.set_agent_typing(false);
            self.emit_error(err.to_widget_error());
        }
    }

    async fn handle_submit_card(&mut self, data: Value, action_title: Option<String>) {
        if !self.require_connected("submit_card") {
            return;
        }
        self.clear_suggestions();

        let envelope = json!({ "type": "adaptiveCardSubmit", "data": data }).to_string();
        let summary = action_title.unwrap_or_else(|| "Form submitted".to_owned());
        let message = Message::user_text(Uuid::new_v4().to_string(), summary, now_ms());
        self.upsert_and_emit(message.clone());
        self.set_agent_typing(true);

        if let Err(err) = self.transport.send_message(&envelope).await {
            let mut failed = message;
            failed.send_failed = true;
            self.upsert_and_emit(failed);
            self.set_agent_typing(false);
            self.emit_error(err.to_widget_error());
        }
    }

    async fn handle_upload(&mut self, upload: OutgoingAttachment) {
        if !self.require_connected("upload") {
            return;
        }

        if upload.data.len() as u64 > self.config.upload_max_bytes {
            self.emit_error(WidgetError::new(
                ErrorCategory::Attachment,
                "attachment_too_large",
                format!(
                    "'{}' exceeds the {} byte upload limit",
                    upload.name, self.config.upload_max_bytes
                ),
            ));
            return;
        }
        if !self
            .config
            .allowed_upload_mime_types
            .iter()
            .any(|allowed| allowed == &upload.mime_type)
        {
            self.emit_error(WidgetError::new(
                ErrorCategory::Attachment,
                "attachment_type_unsupported",
                format!("'{}' is not an accepted file type", upload.mime_type),
            ));
            return;
        }

        let id = Uuid::new_v4().to_string();
        let message = Message {
            attachment: Some(Attachment {
                name: upload.name.clone(),
                mime_type: upload.mime_type.clone(),
                size_bytes: upload.data.len() as u64,
                content_ref: upload.preview_ref.clone(),
                remote_id: None,
            }),
            pending: Some(PendingTransfer::Uploading),
            ..Message::user_text(id.clone(), String::new(), now_ms())
        };
        self.upsert_and_emit(message.clone());
        self.set_agent_typing(true);

        match self
            .transport
            .upload_attachment(&upload.name, &upload.mime_type, &upload.data)
            .await
        {
            Ok(remote_id) => {
                let mut done = message;
                done.pending = None;
                if let Some(attachment) = &mut done.attachment {
                    attachment.remote_id = Some(remote_id);
                }
                self.upsert_and_emit(done);
            }
            Err(err) => {
                // Removing the message drops the local preview handle with it.
                if self.transcript.remove(&id) {
                    self.channels.emit_event(WidgetEvent::MessageRemoved { id });
                }
                self.set_agent_typing(false);
                self.emit_error(err.to_widget_error());
            }
        }
    }

    async fn handle_email(&mut self, address: String) {
        if !self.require_connected("email_transcript") {
            return;
        }
        if !is_valid_email(&address) {
            self.emit_error(WidgetError::new(
                ErrorCategory::Send,
                "invalid_email_address",
                "transcript address is not a valid email",
            ));
            return;
        }
        if let Err(err) = self.transport.email_transcript(&address).await {
            self.emit_error(err.to_widget_error());
        }
    }

    async fn handle_end(&mut self) {
        if let Err(err) = self.session.begin_end() {
            self.emit_error(err);
            return;
        }

        if let Err(err) = self.transport.end_session().await {
            warn!(%err, "transport teardown reported an error");
        }

        // Grace interval for transport-side cleanup to settle before the
        // host learns the session is over.
        tokio::time::sleep(self.config.end_grace_delay).await;
        self.host.notify(HostSignal::EndChat);

        self.transcript.clear();
        self.channels.emit_event(WidgetEvent::TranscriptCleared);
        self.set_agent_typing(false);
        self.clear_suggestions();
        if self.session.queue_info().is_some() {
            self.channels
                .emit_event(WidgetEvent::QueueInfoChanged { queue_info: None });
        }
        if self.session.active_agent().is_some() {
            self.channels
                .emit_event(WidgetEvent::ActiveAgentChanged { agent: None });
        }
        let event = self.session.end_complete();
        self.channels.emit_event(event);
    }

    fn handle_message_payload(&mut self, payload: Value) {
        // Teardown in progress; late transport chatter must not mutate state.
        if self.session.is_ending() {
            trace!("dropping inbound event during teardown");
            return;
        }

        match normalize_event(&payload, now_ms()) {
            Normalized::Message(message) => {
                let message = *message;
                if let Some(attachment) = &message.attachment
                    && attachment.needs_hydration()
                    && let Some(remote_id) = attachment.remote_id.clone()
                {
                    self.spawn_hydration(message.id.clone(), remote_id);
                }
                for event in self.session.note_agent_message(&message) {
                    self.channels.emit_event(event);
                }
                if message.origin == MessageOrigin::Agent {
                    self.spawn_suggestion_fetch(message.id.clone(), message.text.clone());
                }
                self.upsert_and_emit(message);
                // Any inbound message resolves the awaiting-response
                // indicator, remote echoes of our own sends included.
                self.set_agent_typing(false);
            }
            Normalized::Signal(Signal::Queue(update)) => {
                if let Some(event) = self.session.apply_queue_update(update) {
                    self.channels.emit_event(event);
                }
            }
            Normalized::Discarded => trace!("inbound event discarded"),
        }
    }

    fn handle_typing_payload(&mut self, payload: Value) {
        if self.session.is_ending() {
            return;
        }
        self.set_agent_typing(normalize_typing_event(&payload));
    }

    /// Typing doubles as the awaiting-response indicator around sends;
    /// either way an event only goes out on an actual change.
    fn set_agent_typing(&mut self, typing: bool) {
        if typing != self.agent_typing {
            self.agent_typing = typing;
            self.channels.emit_event(WidgetEvent::TypingChanged { typing });
        }
    }

    /// Fetch follow-up chips off-task, keyed by the agent message id so a
    /// slow fetch cannot land chips for a superseded message.
    fn spawn_suggestion_fetch(&mut self, for_id: String, agent_text: String) {
        self.pending_suggestions_for = Some(for_id.clone());
        let source = Arc::clone(&self.suggestions);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let suggestions = match source.follow_ups(&agent_text).await {
                Ok(suggestions) => suggestions,
                Err(err) => {
                    debug!(%err, "follow-up suggestion fetch failed");
                    Vec::new()
                }
            };
            let _ = internal_tx
                .send(InternalMsg::FollowUps {
                    for_id,
                    suggestions,
                })
                .await;
        });
    }

    /// Retract visible chips and invalidate any in-flight fetch.
    fn clear_suggestions(&mut self) {
        self.pending_suggestions_for = None;
        if self.suggestions_shown {
            self.suggestions_shown = false;
            self.channels.emit_event(WidgetEvent::SuggestionsChanged {
                suggestions: Vec::new(),
            });
        }
    }

    /// Fetch attachment content off-task, keyed by message id. The outcome
    /// is applied back on the runtime task, where staleness is checked.
    fn spawn_hydration(&self, id: String, remote_id: String) {
        let transport = Arc::clone(&self.transport);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.download_attachment(&remote_id).await;
            if internal_tx
                .send(InternalMsg::Hydrated { id, outcome })
                .await
                .is_err()
            {
                debug!("runtime gone before hydration completed");
            }
        });
    }

    fn apply_hydration(&mut self, id: String, outcome: Result<String, TransportError>) {
        match outcome {
            Ok(content_ref) => {
                let Some(existing) = self.transcript.get(&id) else {
                    trace!(%id, "hydration target no longer in transcript");
                    return;
                };
                let mut hydrated = existing.clone();
                if let Some(attachment) = &mut hydrated.attachment {
                    attachment.content_ref = Some(content_ref);
                }
                hydrated.pending = None;
                if self.transcript.replace_if_present(hydrated.clone()) {
                    self.channels
                        .emit_event(WidgetEvent::MessageUpserted { message: hydrated });
                }
            }
            Err(err) => {
                // The message stays in its pending-download state; there is
                // no retry, only a toast.
                self.emit_error(err.to_widget_error());
            }
        }
    }

    fn schedule_auto_connect(&self) {
        let token = self.auto_connect.clone();
        let internal_tx = self.internal_tx.clone();
        let delay = self.config.auto_connect_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = internal_tx.send(InternalMsg::AutoStart).await;
                }
            }
        });
    }

    fn require_connected(&mut self, action: &str) -> bool {
        if self.session.state() == SessionState::Connected && !self.session.is_ending() {
            return true;
        }
        self.emit_error(WidgetError::invalid_state(self.session.state(), action));
        false
    }

    fn upsert_and_emit(&mut self, message: Message) {
        self.transcript.upsert(message.clone());
        self.channels
            .emit_event(WidgetEvent::MessageUpserted { message });
    }

    /// Emit an error event per its surface. Toasts get a deferred clear;
    /// banners and blocking errors stay until the user acts.
    fn emit_error(&mut self, error: WidgetError) {
        match error.surface() {
            ErrorSurface::Silent => {
                debug!(%error, "suppressed silent-surface error");
            }
            ErrorSurface::Toast => {
                self.error_seq += 1;
                let seq = self.error_seq;
                self.channels.emit_event(WidgetEvent::ErrorRaised { error });

                let internal_tx = self.internal_tx.clone();
                let delay = self.config.error_clear_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = internal_tx.send(InternalMsg::ClearError { seq }).await;
                });
            }
            ErrorSurface::Banner | ErrorSurface::Blocking => {
                self.channels.emit_event(WidgetEvent::ErrorRaised { error });
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Minimal `local@domain.tld` shape check.
fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
