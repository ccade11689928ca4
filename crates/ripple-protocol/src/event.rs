//! Event types for the Ripple protocol.
//!
//! Each event is a JSON object with an `event` tag and a `data` payload.
//! Inbound events mutate the engine; outbound events are fanned out to
//! the connections of affected participants.

use crate::types::{ChatInfo, ChatKind, ChatMessage, MessageId, UserInfo};
use serde::{Deserialize, Serialize};

/// An event sent by a client over its connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Register presence for this connection.
    ComeOnline {
        user_id: String,
        username: String,
        display_name: String,
    },

    /// Append a message to a chat and fan out `new-message`.
    SendMessage {
        chat_id: String,
        sender_id: String,
        sender_username: String,
        content: String,
    },

    /// Create a chat and fan out `chat-created` to its participants.
    CreateChat {
        id: String,
        kind: ChatKind,
        name: String,
        #[serde(default)]
        description: Option<String>,
        participant_ids: Vec<String>,
        /// Defaults to `[creatorId]` when omitted.
        #[serde(default)]
        admin_ids: Option<Vec<String>>,
        creator_id: String,
    },

    /// Join a chat and fan out `user-joined-chat`.
    JoinChat { chat_id: String, user_id: String },

    /// Leave a chat and fan out `user-left-chat`.
    LeaveChat { chat_id: String, user_id: String },

    /// Search users; replied to with `search-results` on this connection.
    SearchUsers {
        #[serde(rename = "queryText")]
        query: String,
    },

    /// Fetch chat history; replied to with `message-history` on this connection.
    GetMessages { chat_id: String },

    /// Acknowledge a message and fan out `message-read`.
    MarkRead {
        chat_id: String,
        user_id: String,
        message_id: MessageId,
    },

    /// Typing indicator, fanned out as `user-typing`.
    Typing {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
}

/// An event delivered by the server to client connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// The full set of online user ids; sent to everyone on any presence change.
    UsersOnline { users: Vec<String> },

    /// A user's connection closed.
    UserOffline { user_id: String },

    /// A message was appended to a chat the recipient participates in.
    NewMessage(ChatMessage),

    /// A chat the recipient participates in was created.
    ChatCreated(ChatInfo),

    /// A user joined a chat the recipient participates in.
    UserJoinedChat { chat_id: String, user_id: String },

    /// A user left a chat the recipient participates in.
    UserLeftChat { chat_id: String, user_id: String },

    /// A participant acknowledged a message.
    MessageRead {
        chat_id: String,
        message_id: MessageId,
        reader_id: String,
    },

    /// A participant's typing state changed.
    UserTyping {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },

    /// Reply to `search-users`, delivered on the requesting connection only.
    SearchResults { users: Vec<UserInfo> },

    /// Reply to `get-messages`, delivered on the requesting connection only.
    MessageHistory {
        chat_id: String,
        messages: Vec<ChatMessage>,
    },
}
