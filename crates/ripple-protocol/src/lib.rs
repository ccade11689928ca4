//! # ripple-protocol
//!
//! Event and record types for the Ripple realtime chat engine.
//!
//! This crate defines the shapes exchanged between clients and the server:
//!
//! - **ClientEvent** - Inbound events sent by a connected client
//! - **ServerEvent** - Outbound events fanned out to client connections
//! - **Records** - Shared data shapes (`ChatMessage`, `UserInfo`, ...)
//!
//! Events are serialized as JSON text frames. Each event carries an
//! `event` tag (kebab-case) and a `data` payload with camelCase fields.

pub mod event;
pub mod types;

pub use event::{ClientEvent, ServerEvent};
pub use types::{ChatInfo, ChatKind, ChatMessage, ChatSummary, MessageId, UserInfo};
