//! Connection handlers for the Ripple server.
//!
//! This module handles the connection lifecycle, event dispatch into
//! the engine, and the read-only reporting routes.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use ripple_core::{spawn_reaper, ConnectionHandle, Engine, NewChat};
use ripple_protocol::{ClientEvent, ServerEvent};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The fan-out engine.
    pub engine: Arc<Engine>,
    /// Server configuration.
    pub config: Config,
    /// Server start time, for the health endpoint.
    pub started: Instant,
}

impl AppState {
    /// Create new app state around a fresh engine.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            engine: Arc::new(Engine::new()),
            config,
            started: Instant::now(),
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    spawn_reaper(
        state.engine.clone(),
        config.reaper.interval(),
        config.reaper.idle_threshold(),
    );

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/users", get(users_handler))
        .route("/chats", get(chats_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Ripple server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started.elapsed().as_secs(),
    }))
}

/// Aggregate stats handler.
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.stats().await)
}

/// User listing handler.
async fn users_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.list_users().await)
}

/// Chat listing handler.
async fn chats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.list_chats().await)
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (conn, mut outbound) = ConnectionHandle::new();
    let connection_id = conn.id();

    debug!(connection = connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Event loop: drain fan-out deliveries and inbound frames
    loop {
        tokio::select! {
            biased;

            // Events fanned out to this connection
            Some(event) = outbound.recv() => {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        metrics::record_event("outbound");
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = connection_id, error = %e, "Failed to serialize event");
                        metrics::record_error("serialize");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let start = Instant::now();
                        metrics::record_event("inbound");
                        dispatch_event(&text, &conn, &state).await;
                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = connection_id, "Ignoring binary frame");
                        metrics::record_error("binary_frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: mark the owning user offline (no-op if superseded)
    if let Some(user_id) = state.engine.set_offline(connection_id).await {
        debug!(connection = connection_id, user = %user_id, "User went offline");
    }
    metrics::set_users_online(state.engine.stats().await.online_users);

    debug!(connection = connection_id, "WebSocket disconnected");
}

/// Parse and dispatch one inbound event.
///
/// A malformed or failing event is logged and dropped; it never tears
/// down the connection or affects other users.
async fn dispatch_event(text: &str, conn: &ConnectionHandle, state: &Arc<AppState>) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection = conn.id(), error = %e, "Malformed event");
            metrics::record_error("malformed_event");
            return;
        }
    };

    let engine = &state.engine;
    match event {
        ClientEvent::ComeOnline {
            user_id,
            username,
            display_name,
        } => {
            engine
                .set_online(&user_id, &username, &display_name, conn.clone())
                .await;
            metrics::set_users_online(engine.stats().await.online_users);
        }

        ClientEvent::SendMessage {
            chat_id,
            sender_id,
            sender_username,
            content,
        } => {
            if content.len() > state.config.limits.max_message_length {
                warn!(connection = conn.id(), chat = %chat_id, size = content.len(), "Message too large");
                metrics::record_error("oversize_message");
                return;
            }
            match engine
                .send_message(&chat_id, &sender_id, &sender_username, &content)
                .await
            {
                Ok(_) => metrics::record_chat_message(),
                Err(e) => {
                    debug!(connection = conn.id(), error = %e, "Send rejected");
                    metrics::record_error("send_message");
                }
            }
        }

        ClientEvent::CreateChat {
            id,
            kind,
            name,
            description,
            participant_ids,
            admin_ids,
            creator_id,
        } => {
            let new = NewChat {
                id,
                kind,
                name,
                description,
                participants: participant_ids,
                admins: admin_ids,
                owner: creator_id,
            };
            match engine.create_chat(new).await {
                Ok(info) => {
                    debug!(connection = conn.id(), chat = %info.id, "Chat created");
                    metrics::set_active_chats(engine.stats().await.chats);
                }
                Err(e) => {
                    debug!(connection = conn.id(), error = %e, "Create rejected");
                    metrics::record_error("create_chat");
                }
            }
        }

        ClientEvent::JoinChat { chat_id, user_id } => {
            if !engine.join_chat(&chat_id, &user_id).await {
                debug!(connection = conn.id(), chat = %chat_id, user = %user_id, "Join was a no-op");
            }
        }

        ClientEvent::LeaveChat { chat_id, user_id } => {
            if !engine.leave_chat(&chat_id, &user_id).await {
                debug!(connection = conn.id(), chat = %chat_id, user = %user_id, "Leave was a no-op");
            }
        }

        ClientEvent::SearchUsers { query } => {
            let users = engine
                .search_users(&query, state.config.limits.search_result_limit)
                .await;
            conn.send(ServerEvent::SearchResults { users });
        }

        ClientEvent::GetMessages { chat_id } => {
            let messages = engine.history(&chat_id).await;
            conn.send(ServerEvent::MessageHistory { chat_id, messages });
        }

        ClientEvent::MarkRead {
            chat_id,
            user_id,
            message_id,
        } => {
            engine.mark_read(&chat_id, message_id, &user_id).await;
        }

        ClientEvent::Typing {
            chat_id,
            user_id,
            is_typing,
        } => {
            engine.set_typing(&chat_id, &user_id, is_typing).await;
        }
    }
}
