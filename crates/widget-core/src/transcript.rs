use crate::types::Message;

/// Outcome of a transcript upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No message with this id existed; appended at the end.
    Appended,
    /// A message with this id existed; replaced in place.
    Replaced,
}

/// Ordered, identity-keyed transcript of one session.
///
/// Ordering is insertion order, except that replacing an existing message
/// preserves its original position. This is what lets a stub attachment
/// message be completed later without visually reordering the transcript.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Insert a message, or replace the existing one with the same id in
    /// place.
    pub fn upsert(&mut self, message: Message) -> Upsert {
        match self.position_of(&message.id) {
            Some(index) => {
                self.messages[index] = message;
                Upsert::Replaced
            }
            None => {
                self.messages.push(message);
                Upsert::Appended
            }
        }
    }

    /// Replace a message in place only if its id is still present.
    ///
    /// Used by late attachment-hydration completions: after a session-end
    /// `clear`, the id is gone and the update must not resurrect the message.
    pub fn replace_if_present(&mut self, message: Message) -> bool {
        match self.position_of(&message.id) {
            Some(index) => {
                self.messages[index] = message;
                true
            }
            None => false,
        }
    }

    /// Remove a message by id. Only used to drop failed optimistic uploads.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empty the transcript at session end.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }
}
