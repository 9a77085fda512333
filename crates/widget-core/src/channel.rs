//! Command and event plumbing between a host surface and the session runtime.
//!
//! Commands flow through a bounded mpsc channel into the runtime task; events
//! fan out through a broadcast channel so any number of surfaces can observe
//! the same session.

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::types::{WidgetCommand, WidgetEvent};

/// Receiving side of the event fan-out.
pub type EventStream = broadcast::Receiver<WidgetEvent>;

#[derive(Debug, Error)]
pub enum WidgetChannelError {
    /// The runtime task has shut down and no longer accepts commands.
    #[error("command channel closed")]
    CommandChannelClosed,
}

/// Paired command/event channels for one widget session.
#[derive(Debug, Clone)]
pub struct WidgetChannels {
    commands: mpsc::Sender<WidgetCommand>,
    events: broadcast::Sender<WidgetEvent>,
}

impl WidgetChannels {
    /// Create the channel pair, handing back the command receiver for the
    /// runtime task to own.
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<WidgetCommand>) {
        let (commands, command_rx) = mpsc::channel(command_buffer);
        let (events, _) = broadcast::channel(event_buffer);
        (Self { commands, events }, command_rx)
    }

    pub async fn send_command(&self, command: WidgetCommand) -> Result<(), WidgetChannelError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WidgetChannelError::CommandChannelClosed)
    }

    /// Broadcast one event to every subscriber. Lagging or absent subscribers
    /// are not an error; the session never blocks on its observers.
    pub fn emit_event(&self, event: WidgetEvent) {
        if self.events.send(event).is_err() {
            warn!("event emitted with no active subscribers");
        }
    }

    pub fn subscribe_events(&self) -> EventStream {
        self.events.subscribe()
    }
}
