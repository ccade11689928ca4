//! Fixture builders shared by the Ripple benchmarks.

use ripple_core::{ChatDirectory, ConnectionHandle, NewChat, PresenceRegistry};
use ripple_protocol::types::ChatKind;
use ripple_protocol::ServerEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// A presence registry and chat directory with `n` online users all
/// participating in one group chat.
///
/// The receivers must stay alive for the duration of the measurement,
/// otherwise delivery short-circuits on closed channels.
pub struct FanoutFixture {
    pub presence: PresenceRegistry,
    pub directory: ChatDirectory,
    pub chat_id: String,
    pub receivers: Vec<UnboundedReceiver<ServerEvent>>,
}

/// Build a fixture with `n` online participants in a single chat.
#[must_use]
pub fn fanout_fixture(n: usize) -> FanoutFixture {
    let mut presence = PresenceRegistry::new();
    let mut receivers = Vec::with_capacity(n);
    let mut participants = Vec::with_capacity(n);

    for i in 0..n {
        let user_id = format!("user-{i}");
        let (handle, rx) = ConnectionHandle::new();
        presence.set_online(&user_id, format!("u{i}"), format!("User {i}"), handle);
        receivers.push(rx);
        participants.push(user_id);
    }

    let mut directory = ChatDirectory::new();
    directory
        .create(NewChat {
            id: "bench".to_string(),
            kind: ChatKind::Group,
            name: "bench".to_string(),
            description: None,
            owner: participants[0].clone(),
            participants,
            admins: None,
        })
        .expect("fixture chat");

    FanoutFixture {
        presence,
        directory,
        chat_id: "bench".to_string(),
        receivers,
    }
}
