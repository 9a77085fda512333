//! Loopback transport: a scripted in-process backend for demo runs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;
use widget_session::{ChatTransport, SuggestionError, SuggestionSource, TransportError};

const REPLY_DELAY: Duration = Duration::from_millis(150);

/// Transport that greets on connect and echoes every message back as a
/// named human agent, with a typing indicator around each reply.
pub struct LoopbackTransport {
    messages_tx: broadcast::Sender<Value>,
    typing_tx: broadcast::Sender<Value>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let (messages_tx, _) = broadcast::channel(64);
        let (typing_tx, _) = broadcast::channel(64);
        Self {
            messages_tx,
            typing_tx,
        }
    }

    fn agent_payload(text: String) -> Value {
        json!({
            "messageId": Uuid::new_v4().to_string(),
            "content": text,
            "sender": { "displayName": "Echo", "type": "agent" }
        })
    }

    fn schedule_reply(&self, text: String) {
        let messages_tx = self.messages_tx.clone();
        let typing_tx = self.typing_tx.clone();
        tokio::spawn(async move {
            let _ = typing_tx.send(json!({ "typingIndicator": { "state": "typing" } }));
            tokio::time::sleep(REPLY_DELAY).await;
            let _ = typing_tx.send(json!({ "typingIndicator": { "state": "idle" } }));
            let _ = messages_tx.send(Self::agent_payload(text));
        });
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Canned stand-in for the follow-up webhook, used when the demo config
/// carries a `pauUrl`.
pub struct LoopbackSuggestions;

#[async_trait]
impl SuggestionSource for LoopbackSuggestions {
    async fn follow_ups(&self, agent_text: &str) -> Result<Vec<String>, SuggestionError> {
        if agent_text.starts_with("You said:") {
            Ok(vec!["Say it again".to_owned(), "End the chat".to_owned()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn start_session(&self) -> Result<(), TransportError> {
        let _ = self.messages_tx.send(json!({
            "messageType": "system",
            "content": "You are in position 1 in the queue"
        }));
        self.schedule_reply("Hi! You are talking to the loopback agent.".to_owned());
        Ok(())
    }

    async fn send_message(&self, body: &str) -> Result<(), TransportError> {
        self.schedule_reply(format!("You said: {body}"));
        Ok(())
    }

    async fn upload_attachment(
        &self,
        name: &str,
        _mime_type: &str,
        data: &[u8],
    ) -> Result<String, TransportError> {
        debug!(name, bytes = data.len(), "loopback upload accepted");
        Ok(format!("loopback-{name}"))
    }

    async fn download_attachment(&self, remote_id: &str) -> Result<String, TransportError> {
        Ok(format!("loopback://{remote_id}"))
    }

    async fn email_transcript(&self, address: &str) -> Result<(), TransportError> {
        debug!(address, "loopback transcript email accepted");
        Ok(())
    }

    async fn end_session(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<Value> {
        self.messages_tx.subscribe()
    }

    fn subscribe_typing(&self) -> broadcast::Receiver<Value> {
        self.typing_tx.subscribe()
    }
}
