//! Shared record types for the Ripple protocol.
//!
//! These shapes appear both in event payloads and in the read-only
//! reporting surface.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// The kind of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// A two-party conversation.
    Direct,
    /// A multi-party conversation.
    Group,
}

/// A chat message.
///
/// Immutable once sent, except for the read-by set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// The chat this message belongs to.
    pub chat_id: String,
    /// Sender user identity.
    pub sender_id: String,
    /// Sender handle name at send time.
    pub sender_username: String,
    /// Message content.
    pub content: String,
    /// Send timestamp (millis since epoch).
    pub sent_at: u64,
    /// User identities that have acknowledged this message.
    pub read_by: BTreeSet<String>,
}

impl ChatMessage {
    /// Create a new message with a fresh ID and timestamp.
    #[must_use]
    pub fn new(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_username: sender_username.into(),
            content: content.into(),
            sent_at: now_millis(),
            read_by: BTreeSet::new(),
        }
    }
}

/// A user as seen by clients and the reporting surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Opaque user identity.
    pub id: String,
    /// Handle name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Whether the user currently holds a live connection.
    pub online: bool,
    /// Last-seen timestamp (millis since epoch).
    pub last_seen: u64,
}

/// Chat metadata as fanned out on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInfo {
    /// Chat identity.
    pub id: String,
    /// Chat kind.
    pub kind: ChatKind,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Participant identities.
    pub participant_ids: Vec<String>,
    /// Admin identities.
    pub admin_ids: Vec<String>,
    /// Owner identity.
    pub owner_id: String,
    /// Creation timestamp (millis since epoch).
    pub created_at: u64,
}

/// A one-line chat summary for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    /// Chat identity.
    pub id: String,
    /// Chat kind.
    pub kind: ChatKind,
    /// Display name.
    pub name: String,
    /// Number of participants.
    pub participant_count: usize,
    /// Number of stored messages.
    pub message_count: usize,
}
