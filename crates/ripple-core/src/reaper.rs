//! Background cleanup for Ripple.
//!
//! On a fixed interval the reaper retires offline users idle beyond the
//! threshold and deletes orphaned (zero-participant) chats along with
//! their message logs. Each sweep runs under the engine lock, so it
//! never races an in-flight join, leave, or send. Reaped entities emit
//! no client-visible events; this is invisible cleanup.

use crate::engine::{Engine, EngineState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default sweep interval and idle threshold.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(600);

/// Counts from a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Idle offline users deleted.
    pub users_removed: usize,
    /// Orphaned chats deleted (with their message logs).
    pub chats_removed: usize,
}

/// Sweep the repositories once.
///
/// Deletion is unconditional once the threshold is crossed. Chat
/// membership is untouched by user removal; a reaped user's id stays in
/// participant sets until an explicit leave.
pub fn sweep(state: &mut EngineState, idle_threshold: Duration) -> SweepStats {
    let mut stats = SweepStats::default();

    for user_id in state.presence.idle_user_ids(idle_threshold) {
        state.presence.remove(&user_id);
        debug!(user = %user_id, "Reaped idle user");
        stats.users_removed += 1;
    }

    for chat_id in state.directory.orphaned_ids() {
        state.directory.remove(&chat_id);
        state.store.remove(&chat_id);
        debug!(chat = %chat_id, "Reaped orphaned chat");
        stats.chats_removed += 1;
    }

    stats
}

/// Spawn the reaper loop.
///
/// Runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn spawn_reaper(
    engine: Arc<Engine>,
    interval: Duration,
    idle_threshold: Duration,
) -> JoinHandle<()> {
    info!(
        interval_secs = interval.as_secs(),
        idle_threshold_secs = idle_threshold.as_secs(),
        "Starting reaper"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = engine.sweep(idle_threshold).await;
            if stats != SweepStats::default() {
                info!(
                    users_removed = stats.users_removed,
                    chats_removed = stats.chats_removed,
                    "Reaper sweep"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::directory::NewChat;
    use crate::engine::EngineError;
    use ripple_protocol::types::ChatKind;

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

    #[test]
    fn test_reap_idle_user_keeps_membership() {
        let mut state = EngineState::default();

        let (bob_conn, _rx) = ConnectionHandle::new();
        state.presence.set_online("bob", "bob99", "Bob", bob_conn.clone());
        state.directory.create(group("c1", &["alice", "bob"])).unwrap();
        state.store.init("c1");

        state.presence.set_offline(bob_conn.id());
        std::thread::sleep(Duration::from_millis(5));

        let stats = sweep(&mut state, Duration::ZERO);
        assert_eq!(stats.users_removed, 1);
        assert!(state.presence.get("bob").is_none());
        assert!(state.presence.search("bob", 10).is_empty());
        // Membership untouched by presence cleanup
        assert!(state.directory.get("c1").unwrap().is_participant("bob"));
    }

    #[test]
    fn test_online_user_never_reaped() {
        let mut state = EngineState::default();
        let (conn, _rx) = ConnectionHandle::new();
        state.presence.set_online("alice", "alice99", "Alice", conn);
        std::thread::sleep(Duration::from_millis(5));

        let stats = sweep(&mut state, Duration::ZERO);
        assert_eq!(stats.users_removed, 0);
        assert!(state.presence.is_online("alice"));
    }

    #[test]
    fn test_reap_orphaned_chat_discards_log() {
        let mut state = EngineState::default();
        state.directory.create(group("c1", &["alice", "bob"])).unwrap();
        state.store.init("c1");
        state
            .store
            .append("c1", ripple_protocol::ChatMessage::new("c1", "alice", "alice99", "hi"))
            .unwrap();

        state.directory.leave("c1", "alice");
        state.directory.leave("c1", "bob");

        let stats = sweep(&mut state, Duration::ZERO);
        assert_eq!(stats.chats_removed, 1);
        assert!(state.directory.get("c1").is_none());
        assert!(state.store.history("c1").is_empty());
        assert!(matches!(
            state
                .store
                .append("c1", ripple_protocol::ChatMessage::new("c1", "alice", "alice99", "late")),
            Err(EngineError::UnknownChat(_))
        ));
    }

    #[test]
    fn test_populated_chat_survives_sweep() {
        let mut state = EngineState::default();
        state.directory.create(group("c1", &["alice"])).unwrap();
        state.store.init("c1");

        let stats = sweep(&mut state, Duration::ZERO);
        assert_eq!(stats.chats_removed, 0);
        assert!(state.directory.contains("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_reaper_sweeps_on_interval() {
        let engine = Arc::new(Engine::new());
        engine.create_chat(group("c1", &["alice"])).await.unwrap();
        engine.leave_chat("c1", "alice").await;

        let handle = spawn_reaper(engine.clone(), Duration::from_secs(600), Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(601)).await;
        tokio::task::yield_now().await;

        assert!(engine.history("c1").await.is_empty());
        let stats = engine.stats().await;
        assert_eq!(stats.chats, 0);

        handle.abort();
    }
}
