//! Conversation transcript storage.
//!
//! The transcript is the ordered record of one conversation: user turns
//! and assistant turns, appended as the exchange progresses. Streaming
//! updates mutate a message in place rather than appending duplicates.

use crate::models::Message;

/// Ordered store of conversation messages.
///
/// Messages keep their insertion order. Each message id is unique within
/// the store; appends with a duplicate id are rejected.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
}

impl TranscriptStore {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Build a transcript from messages fetched off the server.
    ///
    /// Later duplicates of an already-present id are dropped.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut store = Self::new();
        for message in messages {
            store.append(message);
        }
        store
    }

    /// Append a message to the end of the transcript.
    ///
    /// Returns `false` (and leaves the store untouched) if a message with
    /// the same id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            tracing::warn!(id = %message.id, "rejected duplicate transcript append");
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the content of the message with the given id, in place.
    ///
    /// The updater receives a mutable reference to the stored message; its
    /// position in the transcript does not change. Returns `false` if no
    /// message has that id.
    pub fn update_by_id<F>(&mut self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                updater(message);
                true
            }
            None => false,
        }
    }

    /// Look up a message by id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Snapshot of the transcript for use as request history.
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages, e.g. when switching conversations.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
