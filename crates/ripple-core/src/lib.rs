//! # ripple-core
//!
//! In-memory domain model and fan-out engine for Ripple.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **PresenceRegistry** - Track which users are connected and online
//! - **ChatDirectory** - Chat metadata and participant membership
//! - **MessageStore** - Append-only per-chat message history
//! - **broadcast** - Resolve logical targets into live connections and deliver
//! - **Engine** - Serialization domain binding the repositories together
//! - **reaper** - Background sweep retiring idle users and empty chats
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ ClientEvent │────▶│   Engine    │────▶│  broadcast   │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │                    │
//!              ┌─────────────┼─────────────┐      ▼
//!              ▼             ▼             ▼   connections
//!        ┌──────────┐ ┌───────────┐ ┌──────────┐
//!        │ Presence │ │ Directory │ │  Store   │
//!        └──────────┘ └───────────┘ └──────────┘
//! ```
//!
//! All mutations run under one lock held by the [`Engine`], so every
//! broadcast observes a consistent snapshot at the instant it fires.

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod engine;
pub mod presence;
pub mod reaper;
pub mod store;

pub use connection::{ConnectionHandle, ConnectionId};
pub use directory::{Chat, ChatDirectory, NewChat};
pub use engine::{Engine, EngineError, EngineState, EngineStats};
pub use presence::{PresenceRegistry, User};
pub use reaper::{spawn_reaper, SweepStats};
pub use store::MessageStore;
