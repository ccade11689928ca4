//! The Ripple engine.
//!
//! Binds the presence registry, chat directory, and message store
//! behind a single lock. Every inbound event mutates under that lock
//! and fans out before releasing it, so each broadcast reflects a fully
//! consistent snapshot at the instant it fires. No await happens while
//! the lock is held; delivery into connection handles never blocks.

use crate::broadcast;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::directory::{ChatDirectory, NewChat};
use crate::presence::PresenceRegistry;
use crate::store::MessageStore;
use ripple_protocol::types::{ChatInfo, ChatMessage, ChatSummary, MessageId, UserInfo};
use ripple_protocol::ServerEvent;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Engine errors.
///
/// All variants are local, recoverable conditions signaled to the
/// immediate caller; none terminate processing of other events.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Chat creation rejected (duplicate id or empty participant list).
    #[error("Invalid chat: {0}")]
    InvalidChat(&'static str),

    /// Operation referenced a non-existent chat.
    #[error("Unknown chat: {0}")]
    UnknownChat(String),

    /// Operation referenced a non-existent user.
    #[error("Unknown user: {0}")]
    UnknownUser(String),
}

/// The repositories behind the serialization domain.
#[derive(Debug, Default)]
pub struct EngineState {
    /// User identity to connection state.
    pub presence: PresenceRegistry,
    /// Chat identity to metadata and membership.
    pub directory: ChatDirectory,
    /// Per-chat message logs.
    pub store: MessageStore,
}

impl EngineState {
    fn broadcast_online_set(&self) {
        let event = ServerEvent::UsersOnline {
            users: self.presence.online_user_ids(),
        };
        broadcast::to_everyone(&self.presence, &event);
    }
}

/// Aggregate counters for the reporting surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    /// Known users (online or recently offline).
    pub users: usize,
    /// Currently online users.
    pub online_users: usize,
    /// Existing chats.
    pub chats: usize,
    /// Stored messages across all chats.
    pub messages: usize,
}

/// The central engine.
///
/// Concurrent inbound events serialize on the internal lock and are
/// processed one at a time in arrival order.
#[derive(Debug, Default)]
pub struct Engine {
    inner: Mutex<EngineState>,
}

impl Engine {
    /// Create an engine with empty repositories.
    #[must_use]
    pub fn new() -> Self {
        info!("Creating engine");
        Self::default()
    }

    /// Register or refresh a user's presence.
    ///
    /// Any prior connection for the identity is superseded. Everyone
    /// online receives the updated `users-online` set.
    pub async fn set_online(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
        conn: ConnectionHandle,
    ) {
        let mut state = self.inner.lock().await;
        state
            .presence
            .set_online(user_id, username, display_name, conn);
        state.broadcast_online_set();
    }

    /// Mark the user owning this connection offline.
    ///
    /// Returns the user id if the connection was mapped. On success,
    /// everyone online receives the updated `users-online` set and a
    /// `user-offline` notification.
    pub async fn set_offline(&self, connection_id: ConnectionId) -> Option<String> {
        let mut state = self.inner.lock().await;
        let user_id = state.presence.set_offline(connection_id)?;
        state.broadcast_online_set();
        broadcast::to_everyone(
            &state.presence,
            &ServerEvent::UserOffline {
                user_id: user_id.clone(),
            },
        );
        Some(user_id)
    }

    /// Create a chat, initialize its message log, and notify every
    /// online participant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidChat`] on a duplicate id or an
    /// empty participant list; no message log is created in that case.
    pub async fn create_chat(&self, new: NewChat) -> Result<ChatInfo, EngineError> {
        let mut state = self.inner.lock().await;
        let info = state.directory.create(new)?.info();
        state.store.init(&info.id);

        let event = ServerEvent::ChatCreated(info.clone());
        for user_id in &info.participant_ids {
            broadcast::to_user(&state.presence, user_id, &event);
        }
        Ok(info)
    }

    /// Add a user to a chat.
    ///
    /// Returns `false`, mutating nothing, if the chat does not exist or
    /// the user already belongs. On success all participants, the
    /// joiner included, are notified.
    pub async fn join_chat(&self, chat_id: &str, user_id: &str) -> bool {
        let mut state = self.inner.lock().await;
        if !state.directory.join(chat_id, user_id) {
            return false;
        }
        let event = ServerEvent::UserJoinedChat {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        };
        broadcast::to_participants(&state.directory, &state.presence, chat_id, &event, None);
        true
    }

    /// Remove a user from a chat.
    ///
    /// Returns `false` if the chat does not exist or the user was not a
    /// participant. On success all remaining participants and the
    /// departing user are notified. If the participant set becomes
    /// empty the chat is left orphaned for the reaper.
    pub async fn leave_chat(&self, chat_id: &str, user_id: &str) -> bool {
        let mut state = self.inner.lock().await;
        if !state.directory.leave(chat_id, user_id) {
            return false;
        }
        let event = ServerEvent::UserLeftChat {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        };
        broadcast::to_participants(&state.directory, &state.presence, chat_id, &event, None);
        broadcast::to_user(&state.presence, user_id, &event);
        true
    }

    /// Append a message and fan out `new-message` to every online
    /// participant except the sender.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownChat`] if the chat has no message
    /// log (never created, or already reaped).
    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        sender_username: &str,
        content: &str,
    ) -> Result<ChatMessage, EngineError> {
        let mut state = self.inner.lock().await;
        let message = ChatMessage::new(chat_id, sender_id, sender_username, content);
        state.store.append(chat_id, message.clone())?;

        broadcast::to_participants(
            &state.directory,
            &state.presence,
            chat_id,
            &ServerEvent::NewMessage(message.clone()),
            Some(sender_id),
        );
        Ok(message)
    }

    /// Acknowledge a message and fan out `message-read` to the other
    /// participants.
    ///
    /// Returns `false` if the chat or message is unknown or the reader
    /// had already acknowledged it.
    pub async fn mark_read(&self, chat_id: &str, message_id: MessageId, reader_id: &str) -> bool {
        let mut state = self.inner.lock().await;
        if !state.store.mark_read(chat_id, message_id, reader_id) {
            return false;
        }
        let event = ServerEvent::MessageRead {
            chat_id: chat_id.to_string(),
            message_id,
            reader_id: reader_id.to_string(),
        };
        broadcast::to_participants(
            &state.directory,
            &state.presence,
            chat_id,
            &event,
            Some(reader_id),
        );
        true
    }

    /// Fan out a typing indicator to the other participants of a chat.
    ///
    /// Pure fan-out, no state change. Returns the delivery count.
    pub async fn set_typing(&self, chat_id: &str, user_id: &str, is_typing: bool) -> usize {
        let state = self.inner.lock().await;
        let event = ServerEvent::UserTyping {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            is_typing,
        };
        broadcast::to_participants(
            &state.directory,
            &state.presence,
            chat_id,
            &event,
            Some(user_id),
        )
    }

    /// Case-insensitive substring search over display names and
    /// usernames, capped at `limit`.
    pub async fn search_users(&self, query: &str, limit: usize) -> Vec<UserInfo> {
        self.inner.lock().await.presence.search(query, limit)
    }

    /// Full message history of a chat, oldest first.
    ///
    /// Empty for unknown chats; history lookups never fail.
    pub async fn history(&self, chat_id: &str) -> Vec<ChatMessage> {
        self.inner.lock().await.store.history(chat_id)
    }

    /// Remove idle offline users and orphaned chats.
    ///
    /// Sweeps under the same lock as regular mutations; see
    /// [`crate::reaper`].
    pub async fn sweep(&self, idle_threshold: std::time::Duration) -> crate::reaper::SweepStats {
        let mut state = self.inner.lock().await;
        crate::reaper::sweep(&mut state, idle_threshold)
    }

    /// Aggregate counters for the reporting surface.
    pub async fn stats(&self) -> EngineStats {
        let state = self.inner.lock().await;
        EngineStats {
            users: state.presence.len(),
            online_users: state.presence.online_count(),
            chats: state.directory.len(),
            messages: state.store.total(),
        }
    }

    /// Snapshot of all known users, sorted by id.
    pub async fn list_users(&self) -> Vec<UserInfo> {
        self.inner.lock().await.presence.snapshot()
    }

    /// Snapshot of all chats as one-line summaries, sorted by id.
    pub async fn list_chats(&self) -> Vec<ChatSummary> {
        let state = self.inner.lock().await;
        let mut chats: Vec<ChatSummary> = state
            .directory
            .iter()
            .map(|chat| ChatSummary {
                id: chat.id.clone(),
                kind: chat.kind,
                name: chat.name.clone(),
                participant_count: chat.participants.len(),
                message_count: state.store.count(&chat.id),
            })
            .collect();
        chats.sort_by(|a, b| a.id.cmp(&b.id));
        chats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_protocol::types::ChatKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn online(engine: &Engine, id: &str) -> UnboundedReceiver<ServerEvent> {
        let (handle, rx) = ConnectionHandle::new();
        engine
            .set_online(id, &format!("{id}99"), &id.to_uppercase(), handle)
            .await;
        rx
    }

    fn group(id: &str, participants: &[&str]) -> NewChat {
        NewChat {
            id: id.to_string(),
            kind: ChatKind::Group,
            name: id.to_string(),
            description: None,
            participants: participants.iter().map(ToString::to_string).collect(),
            admins: None,
            owner: participants[0].to_string(),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_online_set_broadcast() {
        let engine = Engine::new();
        let mut alice_rx = online(&engine, "alice").await;
        let _bob_rx = online(&engine, "bob").await;

        let events = drain(&mut alice_rx);
        // Alice saw her own arrival, then Bob's
        assert_eq!(
            events.last(),
            Some(&ServerEvent::UsersOnline {
                users: vec!["alice".into(), "bob".into()]
            })
        );
    }

    #[tokio::test]
    async fn test_message_fanout_excludes_sender() {
        let engine = Engine::new();
        let mut alice_rx = online(&engine, "alice").await;
        let mut bob_rx = online(&engine, "bob").await;
        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();

        let sent = engine
            .send_message("c1", "alice", "alice99", "hi")
            .await
            .unwrap();

        let bob_events = drain(&mut bob_rx);
        let delivered = bob_events
            .iter()
            .find_map(|e| match e {
                ServerEvent::NewMessage(m) => Some(m),
                _ => None,
            })
            .expect("bob should receive new-message");
        assert_eq!(delivered.id, sent.id);
        assert_eq!(delivered.chat_id, "c1");
        assert_eq!(delivered.sender_id, "alice");
        assert_eq!(delivered.content, "hi");

        assert!(!drain(&mut alice_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::NewMessage(_))));
    }

    #[tokio::test]
    async fn test_create_chat_failure_leaves_no_log() {
        let engine = Engine::new();
        let mut bad = group("c1", &["alice"]);
        bad.participants.clear();

        assert!(matches!(
            engine.create_chat(bad).await,
            Err(EngineError::InvalidChat(_))
        ));
        assert!(engine
            .send_message("c1", "alice", "alice99", "hi")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_supersede_silences_old_connection() {
        let engine = Engine::new();
        let (c1, mut rx1) = ConnectionHandle::new();
        engine.set_online("alice", "alice99", "Alice", c1).await;
        let (c2, mut rx2) = ConnectionHandle::new();
        engine.set_online("alice", "alice99", "Alice", c2).await;
        drain(&mut rx1);
        drain(&mut rx2);

        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();
        engine
            .send_message("c1", "bob", "bob99", "ping")
            .await
            .unwrap();

        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2)
            .iter()
            .any(|e| matches!(e, ServerEvent::NewMessage(_))));
    }

    #[tokio::test]
    async fn test_leave_notifies_departing_user() {
        let engine = Engine::new();
        let _alice_rx = online(&engine, "alice").await;
        let mut bob_rx = online(&engine, "bob").await;
        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();
        drain(&mut bob_rx);

        assert!(engine.leave_chat("c1", "bob").await);
        assert!(drain(&mut bob_rx).iter().any(|e| matches!(
            e,
            ServerEvent::UserLeftChat { user_id, .. } if user_id == "bob"
        )));

        // No-op on a repeat leave
        assert!(!engine.leave_chat("c1", "bob").await);
    }

    #[tokio::test]
    async fn test_mark_read_fanout() {
        let engine = Engine::new();
        let mut alice_rx = online(&engine, "alice").await;
        let mut bob_rx = online(&engine, "bob").await;
        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();
        let msg = engine
            .send_message("c1", "alice", "alice99", "hi")
            .await
            .unwrap();
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert!(engine.mark_read("c1", msg.id, "bob").await);
        assert!(drain(&mut alice_rx).iter().any(|e| matches!(
            e,
            ServerEvent::MessageRead { reader_id, .. } if reader_id == "bob"
        )));
        // Reader excluded from the fan-out
        assert!(drain(&mut bob_rx).is_empty());

        assert!(!engine.mark_read("c1", 0, "bob").await);
        assert!(!engine.mark_read("missing", msg.id, "bob").await);
    }

    #[tokio::test]
    async fn test_typing_fanout() {
        let engine = Engine::new();
        let _alice_rx = online(&engine, "alice").await;
        let mut bob_rx = online(&engine, "bob").await;
        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();
        drain(&mut bob_rx);

        assert_eq!(engine.set_typing("c1", "alice", true).await, 1);
        assert!(drain(&mut bob_rx).iter().any(|e| matches!(
            e,
            ServerEvent::UserTyping { is_typing: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_list_chats_counts() {
        let engine = Engine::new();
        engine.create_chat(group("c1", &["alice", "bob"])).await.unwrap();
        engine.create_chat(group("c2", &["alice"])).await.unwrap();
        engine
            .send_message("c1", "alice", "alice99", "hi")
            .await
            .unwrap();

        let chats = engine.list_chats().await;
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, "c1");
        assert_eq!(chats[0].participant_count, 2);
        assert_eq!(chats[0].message_count, 1);
        assert_eq!(chats[1].message_count, 0);
    }
}
