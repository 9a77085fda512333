use tracing::debug;

use crate::{
    error::WidgetError,
    types::{AgentIdentity, Message, MessageOrigin, QueueInfo, QueueUpdate, SessionState, WidgetEvent},
};

/// Session lifecycle state machine plus the facts derived from it.
///
/// One instance exists per widget lifetime; `end_complete` resets every
/// ephemeral field so a new session can start immediately after.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    /// Set between an end request and teardown completion; blocks
    /// auto-connect and all UI mutation in between.
    ending: bool,
    /// Cleared permanently after the first connect failure.
    auto_connect_enabled: bool,
    queue_info: Option<QueueInfo>,
    active_agent: Option<AgentIdentity>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            ending: false,
            auto_connect_enabled: true,
            queue_info: None,
            active_agent: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ending(&self) -> bool {
        self.ending
    }

    pub fn queue_info(&self) -> Option<QueueInfo> {
        self.queue_info
    }

    pub fn active_agent(&self) -> Option<&AgentIdentity> {
        self.active_agent.as_ref()
    }

    /// Whether a deferred auto-connect trigger may still fire.
    pub fn can_auto_connect(&self) -> bool {
        self.auto_connect_enabled && !self.ending && self.state == SessionState::Idle
    }

    /// `Idle -> Connecting` on an explicit or auto-triggered start request.
    pub fn begin_connect(&mut self) -> Result<WidgetEvent, WidgetError> {
        if self.ending || self.state != SessionState::Idle {
            return Err(WidgetError::invalid_state(self.state, "start"));
        }
        self.transition(SessionState::Connecting)
    }

    /// `Connecting -> Connected` once the transport reports establishment.
    pub fn connect_established(&mut self) -> Result<WidgetEvent, WidgetError> {
        if self.state != SessionState::Connecting {
            return Err(WidgetError::invalid_state(self.state, "connect_established"));
        }
        self.transition(SessionState::Connected)
    }

    /// `Connecting -> Idle` on transport init failure.
    ///
    /// Auto-connect stays disabled for the rest of the widget's life; the
    /// user must retry explicitly.
    pub fn connect_failed(&mut self) -> Result<WidgetEvent, WidgetError> {
        if self.state != SessionState::Connecting {
            return Err(WidgetError::invalid_state(self.state, "connect_failed"));
        }
        self.auto_connect_enabled = false;
        self.transition(SessionState::Idle)
    }

    /// Raise the ending flag ahead of transport teardown.
    pub fn begin_end(&mut self) -> Result<(), WidgetError> {
        if self.state != SessionState::Connected {
            return Err(WidgetError::invalid_state(self.state, "end"));
        }
        self.ending = true;
        self.auto_connect_enabled = false;
        Ok(())
    }

    /// Finish teardown: back to `Idle` with all ephemeral state reset.
    pub fn end_complete(&mut self) -> WidgetEvent {
        self.ending = false;
        self.queue_info = None;
        self.active_agent = None;
        self.state = SessionState::Idle;
        debug!("session ended, ephemeral state reset");
        WidgetEvent::StateChanged {
            state: SessionState::Idle,
        }
    }

    /// Merge a queue-status extraction into the session.
    ///
    /// Returns an event only when the visible queue info actually changed.
    pub fn apply_queue_update(&mut self, update: QueueUpdate) -> Option<WidgetEvent> {
        if update.is_empty() {
            return None;
        }
        let mut info = self.queue_info.unwrap_or_default();
        if let Some(position) = update.position {
            info.position = Some(position);
        }
        if let Some(wait) = update.estimated_wait_secs {
            info.estimated_wait_secs = Some(wait);
        }
        if self.queue_info == Some(info) {
            return None;
        }
        self.queue_info = Some(info);
        Some(WidgetEvent::QueueInfoChanged {
            queue_info: self.queue_info,
        })
    }

    /// Update derived facts from an incoming agent message.
    ///
    /// The first agent message clears any queue banner; a display-worthy
    /// identity becomes the active agent.
    pub fn note_agent_message(&mut self, message: &Message) -> Vec<WidgetEvent> {
        let mut events = Vec::new();
        if message.origin != MessageOrigin::Agent {
            return events;
        }

        if let Some(identity) = &message.agent_identity
            && self.active_agent.as_ref() != Some(identity)
        {
            self.active_agent = Some(identity.clone());
            events.push(WidgetEvent::ActiveAgentChanged {
                agent: self.active_agent.clone(),
            });
        }

        if self.queue_info.is_some() {
            self.queue_info = None;
            events.push(WidgetEvent::QueueInfoChanged { queue_info: None });
        }

        events
    }

    fn transition(&mut self, next: SessionState) -> Result<WidgetEvent, WidgetError> {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(WidgetEvent::StateChanged { state: next })
    }
}
