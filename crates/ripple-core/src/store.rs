//! Message store for Ripple.
//!
//! Append-only per-chat ordered logs. The store exclusively owns
//! message bodies; the chat directory holds metadata only.

use crate::engine::EngineError;
use ripple_protocol::types::{ChatMessage, MessageId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Per-chat message logs.
#[derive(Debug, Default)]
pub struct MessageStore {
    /// Logs indexed by chat id, append order.
    logs: HashMap<String, Vec<ChatMessage>>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize an empty log for a chat.
    ///
    /// Called at chat creation; appends to uninitialized logs fail.
    pub fn init(&mut self, chat_id: impl Into<String>) {
        self.logs.entry(chat_id.into()).or_default();
    }

    /// Append a message to a chat's log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownChat`] if the chat has no
    /// initialized log.
    pub fn append(&mut self, chat_id: &str, message: ChatMessage) -> Result<(), EngineError> {
        let Some(log) = self.logs.get_mut(chat_id) else {
            return Err(EngineError::UnknownChat(chat_id.to_string()));
        };
        trace!(chat = %chat_id, message = message.id, "Message appended");
        log.push(message);
        Ok(())
    }

    /// Full history of a chat, oldest first.
    ///
    /// Returns an empty vec for unknown chats; a requester racing a
    /// chat's deletion gets nothing, not an error.
    #[must_use]
    pub fn history(&self, chat_id: &str) -> Vec<ChatMessage> {
        self.logs.get(chat_id).cloned().unwrap_or_default()
    }

    /// Add a reader to a message's read-by set.
    ///
    /// Returns `false` if the chat or message is unknown.
    pub fn mark_read(&mut self, chat_id: &str, message_id: MessageId, reader_id: &str) -> bool {
        let Some(log) = self.logs.get_mut(chat_id) else {
            return false;
        };
        let Some(message) = log.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.read_by.insert(reader_id.to_string())
    }

    /// Number of messages in a chat's log.
    #[must_use]
    pub fn count(&self, chat_id: &str) -> usize {
        self.logs.get(chat_id).map_or(0, Vec::len)
    }

    /// Total messages across all logs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    /// Discard a chat's log entirely.
    pub fn remove(&mut self, chat_id: &str) -> bool {
        let removed = self.logs.remove(chat_id).is_some();
        if removed {
            debug!(chat = %chat_id, "Message log discarded");
        }
        removed
    }

    /// Check if a chat has an initialized log.
    #[must_use]
    pub fn contains(&self, chat_id: &str) -> bool {
        self.logs.contains_key(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_requires_init() {
        let mut store = MessageStore::new();

        let result = store.append("c1", ChatMessage::new("c1", "alice", "alice99", "hi"));
        assert!(matches!(result, Err(EngineError::UnknownChat(_))));

        store.init("c1");
        store
            .append("c1", ChatMessage::new("c1", "alice", "alice99", "hi"))
            .unwrap();
        assert_eq!(store.count("c1"), 1);
    }

    #[test]
    fn test_history_preserves_append_order() {
        let mut store = MessageStore::new();
        store.init("c1");

        for i in 0..5 {
            store
                .append("c1", ChatMessage::new("c1", "alice", "alice99", format!("m{i}")))
                .unwrap();
        }

        let history = store.history("c1");
        assert_eq!(history.len(), 5);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_history_unknown_chat_is_empty() {
        let store = MessageStore::new();
        assert!(store.history("missing").is_empty());
    }

    #[test]
    fn test_mark_read() {
        let mut store = MessageStore::new();
        store.init("c1");
        let msg = ChatMessage::new("c1", "alice", "alice99", "hi");
        let msg_id = msg.id;
        store.append("c1", msg).unwrap();

        assert!(store.mark_read("c1", msg_id, "bob"));
        assert!(!store.mark_read("c1", msg_id, "bob")); // Already read
        assert!(!store.mark_read("c1", 0, "bob")); // Unknown message
        assert!(!store.mark_read("missing", msg_id, "bob")); // Unknown chat

        assert!(store.history("c1")[0].read_by.contains("bob"));
    }

    #[test]
    fn test_remove_discards_log() {
        let mut store = MessageStore::new();
        store.init("c1");
        store
            .append("c1", ChatMessage::new("c1", "alice", "alice99", "hi"))
            .unwrap();

        assert!(store.remove("c1"));
        assert!(store.history("c1").is_empty());
        assert!(store
            .append("c1", ChatMessage::new("c1", "alice", "alice99", "again"))
            .is_err());
    }
}
