//! Live connection handles.
//!
//! A handle is the delivery end of a client connection: an id plus an
//! unbounded sender of [`ServerEvent`]s. The transport layer drains the
//! paired receiver and writes frames to the socket.

use ripple_protocol::ServerEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::trace;

/// A unique connection identifier.
pub type ConnectionId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique connection ID.
#[must_use]
pub fn generate_connection_id() -> ConnectionId {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// An opaque reference to a live, addressable client connection.
///
/// Delivery is fire-and-forget: sending to a handle whose receiver has
/// been dropped is silently ignored, and sending never blocks. A handle
/// becomes invalid on disconnect.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a new handle and the receiver the transport drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: generate_connection_id(),
                tx,
            },
            rx,
        )
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Deliver an event to this connection.
    ///
    /// Returns `false` if the receiving side is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        let delivered = self.tx.send(event).is_ok();
        if !delivered {
            trace!(connection = self.id, "Dropped event for closed connection");
        }
        delivered
    }
}
