//! Presence registry for Ripple.
//!
//! Maps user identity to connection state and online status. The
//! registry exclusively owns [`User`] entities; other components refer
//! to users by identity only.

use crate::connection::{ConnectionHandle, ConnectionId};
use ripple_protocol::types::{now_millis, UserInfo};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Default cap on search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A known user and their connection state.
#[derive(Debug)]
pub struct User {
    /// Opaque user identity.
    pub id: String,
    /// Handle name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Live connection, present only while connected.
    conn: Option<ConnectionHandle>,
    /// Online flag.
    pub online: bool,
    /// Last-seen timestamp (millis since epoch).
    pub last_seen: u64,
}

impl User {
    /// Snapshot this user as a wire record.
    #[must_use]
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            online: self.online,
            last_seen: self.last_seen,
        }
    }
}

/// Registry of known users and their live connections.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// Users indexed by identity.
    users: HashMap<String, User>,
    /// Reverse index: connection id to owning user.
    by_connection: HashMap<ConnectionId, String>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh a user, marking them online.
    ///
    /// Any prior connection handle for the same identity is superseded:
    /// the new connection wins and the old one is unmapped, so a late
    /// `set_offline` for the stale handle finds no owner. Last-write-wins
    /// here is deliberate, not incidental.
    pub fn set_online(
        &mut self,
        user_id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        conn: ConnectionHandle,
    ) {
        let user_id = user_id.into();
        let conn_id = conn.id();

        // A connection re-identifying as a different user releases its
        // prior owner; otherwise that user would stay online forever on
        // a handle someone else holds.
        if let Some(prior) = self.by_connection.remove(&conn_id) {
            if prior != user_id {
                if let Some(user) = self.users.get_mut(&prior) {
                    user.conn = None;
                    user.online = false;
                    user.last_seen = now_millis();
                    debug!(user = %prior, connection = conn_id, "Connection rebound to another user");
                }
            }
        }

        if let Some(existing) = self.users.get(&user_id) {
            if let Some(old) = &existing.conn {
                self.by_connection.remove(&old.id());
                debug!(user = %user_id, old_connection = old.id(), "Superseding connection");
            }
        }

        self.by_connection.insert(conn_id, user_id.clone());
        let user = User {
            id: user_id.clone(),
            username: username.into(),
            display_name: display_name.into(),
            conn: Some(conn),
            online: true,
            last_seen: now_millis(),
        };
        self.users.insert(user_id.clone(), user);

        debug!(user = %user_id, connection = conn_id, "User online");
    }

    /// Mark the user owning this connection offline.
    ///
    /// Returns the user id, or `None` if the connection is unknown
    /// (already superseded or never registered). Idempotent.
    pub fn set_offline(&mut self, connection_id: ConnectionId) -> Option<String> {
        let user_id = self.by_connection.remove(&connection_id)?;
        if let Some(user) = self.users.get_mut(&user_id) {
            user.conn = None;
            user.online = false;
            user.last_seen = now_millis();
            debug!(user = %user_id, connection = connection_id, "User offline");
        }
        Some(user_id)
    }

    /// Check if a user is online.
    #[must_use]
    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.get(user_id).is_some_and(|u| u.online)
    }

    /// Look up a user by identity.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    /// Resolve a user to their live connection handle, if online.
    #[must_use]
    pub fn connection_of(&self, user_id: &str) -> Option<&ConnectionHandle> {
        self.users.get(user_id).and_then(|u| u.conn.as_ref())
    }

    /// Case-insensitive substring search over display name and username.
    ///
    /// Results are sorted by user id and truncated to `limit`.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<UserInfo> {
        let needle = query.to_lowercase();
        let mut matches: Vec<UserInfo> = self
            .users
            .values()
            .filter(|u| {
                u.display_name.to_lowercase().contains(&needle)
                    || u.username.to_lowercase().contains(&needle)
            })
            .map(User::info)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(limit);
        matches
    }

    /// Sorted ids of all currently online users.
    #[must_use]
    pub fn online_user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .users
            .values()
            .filter(|u| u.online)
            .map(|u| u.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Iterate the live connection handles of all online users.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.users.values().filter_map(|u| u.conn.as_ref())
    }

    /// Ids of offline users idle beyond the given threshold.
    #[must_use]
    pub fn idle_user_ids(&self, threshold: Duration) -> Vec<String> {
        let now = now_millis();
        let threshold_ms = threshold.as_millis() as u64;
        self.users
            .values()
            .filter(|u| !u.online && now.saturating_sub(u.last_seen) > threshold_ms)
            .map(|u| u.id.clone())
            .collect()
    }

    /// Delete a user entity.
    ///
    /// Returns `true` if the user existed.
    pub fn remove(&mut self, user_id: &str) -> bool {
        match self.users.remove(user_id) {
            Some(user) => {
                if let Some(conn) = &user.conn {
                    self.by_connection.remove(&conn.id());
                }
                debug!(user = %user_id, "User removed");
                true
            }
            None => false,
        }
    }

    /// Number of known users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of online users.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.users.values().filter(|u| u.online).count()
    }

    /// Snapshot of all users, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self.users.values().map(User::info).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}
