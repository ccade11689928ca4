//! Chat directory for Ripple.
//!
//! Maps chat identity to chat metadata and participant membership. The
//! directory owns metadata only; message bodies live in the
//! [`MessageStore`](crate::store::MessageStore), which bounds the cost
//! of listing chats.

use crate::engine::EngineError;
use ripple_protocol::types::{now_millis, ChatInfo, ChatKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Parameters for creating a chat.
#[derive(Debug, Clone)]
pub struct NewChat {
    /// Chat identity.
    pub id: String,
    /// Chat kind.
    pub kind: ChatKind,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial participant identities.
    pub participants: Vec<String>,
    /// Admin identities; defaults to `[owner]` when `None`.
    pub admins: Option<Vec<String>>,
    /// Owner identity.
    pub owner: String,
}

/// A chat and its membership.
#[derive(Debug)]
pub struct Chat {
    /// Chat identity.
    pub id: String,
    /// Chat kind.
    pub kind: ChatKind,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Participant identities.
    pub participants: HashSet<String>,
    /// Admin identities.
    pub admins: HashSet<String>,
    /// Owner identity.
    pub owner: String,
    /// Creation timestamp (millis since epoch).
    pub created_at: u64,
    /// Set once the participant set becomes empty; cleanup is the
    /// reaper's job, never done inline.
    pub orphaned: bool,
}

impl Chat {
    /// Check if a user is a participant.
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.contains(user_id)
    }

    /// Snapshot this chat as a wire record.
    #[must_use]
    pub fn info(&self) -> ChatInfo {
        let mut participant_ids: Vec<String> = self.participants.iter().cloned().collect();
        participant_ids.sort();
        let mut admin_ids: Vec<String> = self.admins.iter().cloned().collect();
        admin_ids.sort();

        ChatInfo {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            description: self.description.clone(),
            participant_ids,
            admin_ids,
            owner_id: self.owner.clone(),
            created_at: self.created_at,
        }
    }
}

/// Directory of all chats.
#[derive(Debug, Default)]
pub struct ChatDirectory {
    /// Chats indexed by identity.
    chats: HashMap<String, Chat>,
}

impl ChatDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chat.
    ///
    /// The owner is always inserted into both the participant and the
    /// admin set, whatever the request carried.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidChat`] if the id is already taken
    /// or the participant list is empty.
    pub fn create(&mut self, new: NewChat) -> Result<&Chat, EngineError> {
        if self.chats.contains_key(&new.id) {
            return Err(EngineError::InvalidChat("chat id already exists"));
        }
        if new.participants.is_empty() {
            return Err(EngineError::InvalidChat("participant list is empty"));
        }

        let mut participants: HashSet<String> = new.participants.into_iter().collect();
        participants.insert(new.owner.clone());

        let mut admins: HashSet<String> = new
            .admins
            .unwrap_or_else(|| vec![new.owner.clone()])
            .into_iter()
            .collect();
        admins.insert(new.owner.clone());

        debug!(chat = %new.id, kind = ?new.kind, participants = participants.len(), "Chat created");

        let chat = Chat {
            id: new.id.clone(),
            kind: new.kind,
            name: new.name,
            description: new.description,
            participants,
            admins,
            owner: new.owner,
            created_at: now_millis(),
            orphaned: false,
        };

        Ok(self.chats.entry(new.id).or_insert(chat))
    }

    /// Look up a chat.
    #[must_use]
    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.get(chat_id)
    }

    /// Add a user to a chat's participant set.
    ///
    /// Returns `false`, mutating nothing, if the chat does not exist or
    /// the user is already a participant.
    pub fn join(&mut self, chat_id: &str, user_id: &str) -> bool {
        let Some(chat) = self.chats.get_mut(chat_id) else {
            return false;
        };
        let added = chat.participants.insert(user_id.to_string());
        if added {
            chat.orphaned = false;
            debug!(chat = %chat_id, user = %user_id, "User joined chat");
        }
        added
    }

    /// Remove a user from a chat's participant set.
    ///
    /// Returns `false` if the chat does not exist or the user was not a
    /// participant. A leave that empties the set marks the chat
    /// orphaned for the reaper; deletion is deferred so an in-flight
    /// send never races a vanishing chat.
    pub fn leave(&mut self, chat_id: &str, user_id: &str) -> bool {
        let Some(chat) = self.chats.get_mut(chat_id) else {
            return false;
        };
        let removed = chat.participants.remove(user_id);
        if removed {
            debug!(chat = %chat_id, user = %user_id, "User left chat");
            if chat.participants.is_empty() {
                chat.orphaned = true;
                debug!(chat = %chat_id, "Chat orphaned");
            }
        }
        removed
    }

    /// Delete a chat entity.
    pub fn remove(&mut self, chat_id: &str) -> bool {
        self.chats.remove(chat_id).is_some()
    }

    /// Ids of chats marked orphaned by a leave that emptied them.
    ///
    /// The mark, not a live emptiness check, is what the reaper sweeps
    /// on; a join between mark and sweep rescues the chat.
    #[must_use]
    pub fn orphaned_ids(&self) -> Vec<String> {
        self.chats
            .values()
            .filter(|c| c.orphaned)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Check if a chat exists.
    #[must_use]
    pub fn contains(&self, chat_id: &str) -> bool {
        self.chats.contains_key(chat_id)
    }

    /// Number of chats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Check if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Iterate all chats.
    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.values()
    }
}
