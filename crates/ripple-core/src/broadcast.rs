//! Fan-out delivery for Ripple.
//!
//! Translates a logical target (a chat's participants, a single user,
//! or everyone) into live connection handles and delivers an event to
//! each. Delivery is best-effort to currently connected sockets only:
//! offline participants are silently skipped, there is no queuing and
//! no retry.
//!
//! The resolve step is explicit (directory lookup, then presence
//! lookup, then deliver) so absences are observable rather than hidden
//! behind a pub/sub tag.

use crate::directory::ChatDirectory;
use crate::presence::PresenceRegistry;
use ripple_protocol::ServerEvent;
use tracing::{trace, warn};

/// Deliver an event to every online participant of a chat.
///
/// `exclude` skips one user id, typically the sender. Returns the
/// number of handles the event was delivered to.
pub fn to_participants(
    directory: &ChatDirectory,
    presence: &PresenceRegistry,
    chat_id: &str,
    event: &ServerEvent,
    exclude: Option<&str>,
) -> usize {
    let Some(chat) = directory.get(chat_id) else {
        warn!(chat = %chat_id, "Fan-out to non-existent chat");
        return 0;
    };

    let mut delivered = 0;
    for user_id in &chat.participants {
        if exclude.is_some_and(|ex| ex == user_id) {
            continue;
        }
        if let Some(conn) = presence.connection_of(user_id) {
            if conn.send(event.clone()) {
                delivered += 1;
            }
        }
    }

    trace!(chat = %chat_id, recipients = delivered, "Fanned out to participants");
    delivered
}

/// Deliver an event to a single user's connection, if online.
///
/// Returns `true` on delivery.
pub fn to_user(presence: &PresenceRegistry, user_id: &str, event: &ServerEvent) -> bool {
    match presence.connection_of(user_id) {
        Some(conn) => conn.send(event.clone()),
        None => false,
    }
}

/// Deliver an event to every currently online connection.
///
/// Returns the number of handles delivered to.
pub fn to_everyone(presence: &PresenceRegistry, event: &ServerEvent) -> usize {
    let mut delivered = 0;
    for conn in presence.connections() {
        if conn.send(event.clone()) {
            delivered += 1;
        }
    }
    trace!(recipients = delivered, "Fanned out to everyone");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::directory::NewChat;
    use ripple_protocol::types::ChatKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn typing_event() -> ServerEvent {
        ServerEvent::UserTyping {
            chat_id: "c1".into(),
            user_id: "alice".into(),
            is_typing: true,
        }
    }

    fn online(
        presence: &mut PresenceRegistry,
        id: &str,
    ) -> UnboundedReceiver<ServerEvent> {
        let (handle, rx) = ConnectionHandle::new();
        presence.set_online(id, format!("{id}99"), id, handle);
        rx
    }

    fn chat(directory: &mut ChatDirectory, id: &str, participants: &[&str]) {
        directory
            .create(NewChat {
                id: id.to_string(),
                kind: ChatKind::Group,
                name: id.to_string(),
                description: None,
                participants: participants.iter().map(ToString::to_string).collect(),
                admins: None,
                owner: participants[0].to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_to_participants_excludes_sender() {
        let mut presence = PresenceRegistry::new();
        let mut directory = ChatDirectory::new();

        let mut alice_rx = online(&mut presence, "alice");
        let mut bob_rx = online(&mut presence, "bob");
        chat(&mut directory, "c1", &["alice", "bob"]);

        let delivered =
            to_participants(&directory, &presence, "c1", &typing_event(), Some("alice"));
        assert_eq!(delivered, 1);
        assert!(bob_rx.try_recv().is_ok());
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_to_participants_skips_offline() {
        let mut presence = PresenceRegistry::new();
        let mut directory = ChatDirectory::new();

        let alice = {
            let (handle, _rx) = ConnectionHandle::new();
            presence.set_online("alice", "alice99", "Alice", handle.clone());
            handle
        };
        let _bob_rx = online(&mut presence, "bob");
        chat(&mut directory, "c1", &["alice", "bob"]);

        presence.set_offline(alice.id());
        let delivered = to_participants(&directory, &presence, "c1", &typing_event(), None);
        assert_eq!(delivered, 1);
    }

    #[test]
    fn test_to_participants_unknown_chat() {
        let presence = PresenceRegistry::new();
        let directory = ChatDirectory::new();
        assert_eq!(
            to_participants(&directory, &presence, "missing", &typing_event(), None),
            0
        );
    }

    #[test]
    fn test_to_user() {
        let mut presence = PresenceRegistry::new();
        let mut rx = online(&mut presence, "alice");

        assert!(to_user(&presence, "alice", &typing_event()));
        assert!(rx.try_recv().is_ok());
        assert!(!to_user(&presence, "nobody", &typing_event()));
    }

    #[test]
    fn test_to_everyone() {
        let mut presence = PresenceRegistry::new();
        let mut rx1 = online(&mut presence, "alice");
        let mut rx2 = online(&mut presence, "bob");

        assert_eq!(to_everyone(&presence, &typing_event()), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
