//! Backchannel production server.
//!
//! In-memory room broadcast server: participants join an ephemeral room over
//! a WebSocket, fan out reactions/questions/comments, attach threaded
//! replies, and export transcripts. No database — room state is volatile by
//! design and lives for the process lifetime.
//!
//! # Architecture
//!
//! The crate follows the Sans-IO pattern: [`RoomRouter`] is the action-based
//! protocol state machine (pure logic, no I/O), and [`Server`] is the
//! production runtime that executes its actions over axum WebSockets with a
//! Tokio runtime.
//!
//! # Components
//!
//! - [`RoomRouter`]: event-to-action orchestrator over store and registry
//! - [`RoomStore`]: per-room append-only message logs
//! - [`ConnectionRegistry`]: connection ↔ room membership
//! - [`Server`]: WebSocket runtime that executes router actions
//! - [`SystemEnv`]: production environment (wall clock, OS RNG)

mod env;
mod error;
mod registry;
mod router;
mod store;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
pub use env::{Environment, SystemEnv};
pub use error::RouterError;
use futures_util::{SinkExt, StreamExt};
pub use registry::ConnectionRegistry;
pub use router::{LogLevel, RoomRouter, RouterAction, RouterConfig, RouterEvent};
pub use store::RoomStore;
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock, mpsc},
};
use tower_http::cors::CorsLayer;

use backchannel_proto::ClientEvent;

/// Shared state for all connections.
///
/// The router mutex serializes mutate-then-fan-out per inbound event, so a
/// room's log never sees interleaved mutation. The sender map carries each
/// connection's outbound queue; all frames to a client go through its single
/// queue, preserving per-connection ordering.
#[derive(Clone)]
struct SharedState {
    /// The protocol state machine, one per process.
    router: Arc<Mutex<RoomRouter<SystemEnv>>>,
    /// Connection id → outbound frame queue.
    senders: Arc<RwLock<HashMap<u64, mpsc::UnboundedSender<WsMessage>>>>,
    /// Environment (wall clock, RNG).
    env: SystemEnv,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3001").
    pub bind_address: String,
    /// Router configuration (connection limits).
    pub router: RouterConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:3001".to_string(), router: RouterConfig::default() }
    }
}

/// Production backchannel server.
///
/// Wraps [`RoomRouter`] with an axum WebSocket transport and the system
/// environment.
pub struct Server {
    listener: TcpListener,
    state: SharedState,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, std::io::Error> {
        let env = SystemEnv::new();
        let router = RoomRouter::new(env.clone(), config.router);

        let state = SharedState {
            router: Arc::new(Mutex::new(router)),
            senders: Arc::new(RwLock::new(HashMap::new())),
            env,
        };

        let listener = TcpListener::bind(&config.bind_address).await?;
        Ok(Self { listener, state })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Run the server, accepting connections and relaying events.
    ///
    /// Runs until the process is shut down or the listener fails.
    pub async fn run(self) -> Result<(), std::io::Error> {
        tracing::info!("server listening on {}", self.listener.local_addr()?);

        // CORS is wide open: room clients are served from arbitrary origins,
        // matching the deployment this replaces.
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        axum::serve(self.listener, app).await
    }
}

/// Upgrade an HTTP request to a WebSocket connection.
async fn ws_handler(State(state): State<SharedState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Drive a single WebSocket connection for its whole lifetime.
async fn handle_connection(socket: WebSocket, state: SharedState) {
    let conn_id = state.env.random_u64();
    tracing::debug!("new connection: {conn_id}");

    let (mut sink, mut stream) = socket.split();

    // Single writer task per connection; the unbounded queue decouples router
    // fan-out from slow clients so one stalled socket never blocks a room.
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    {
        let mut senders = state.senders.write().await;
        senders.insert(conn_id, tx);
    }

    {
        let mut router = state.router.lock().await;
        match router.process_event(RouterEvent::ConnectionOpened { conn_id }) {
            Ok(actions) => execute_actions(&router, actions, &state.senders).await,
            Err(e) => tracing::error!("open failed for {conn_id}: {e}"),
        }
    }

    // The connection may have been refused (max connections); its queue is
    // gone from the map in that case and there is nothing to read.
    let refused = !state.senders.read().await.contains_key(&conn_id);

    if !refused {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                WsMessage::Text(text) => {
                    // Malformed input is rejected before any state mutation;
                    // the connection itself stays up.
                    let event = match ClientEvent::from_json(text.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("invalid frame from {conn_id}: {e}");
                            continue;
                        },
                    };

                    let mut router = state.router.lock().await;
                    match router.process_event(RouterEvent::ClientEventReceived {
                        conn_id,
                        event,
                    }) {
                        Ok(actions) => execute_actions(&router, actions, &state.senders).await,
                        Err(e) => tracing::warn!("event from {conn_id} dropped: {e}"),
                    }
                },
                WsMessage::Binary(_) => {
                    tracing::warn!("binary frame from {conn_id} ignored");
                },
                WsMessage::Close(_) => break,
                // Axum answers pings itself; pongs need no action.
                WsMessage::Ping(_) | WsMessage::Pong(_) => {},
            }
        }
    }

    writer.abort();
    {
        let mut senders = state.senders.write().await;
        senders.remove(&conn_id);
    }

    {
        let mut router = state.router.lock().await;
        match router.process_event(RouterEvent::ConnectionClosed {
            conn_id,
            reason: "connection closed".to_string(),
        }) {
            Ok(actions) => execute_actions(&router, actions, &state.senders).await,
            Err(e) => tracing::error!("close failed for {conn_id}: {e}"),
        }
    }
}

/// Execute router actions against live connections.
///
/// A failed send to one connection is logged and never blocks delivery to
/// the rest of a room, and never feeds back into router state.
async fn execute_actions(
    router: &RoomRouter<SystemEnv>,
    actions: Vec<RouterAction>,
    senders: &RwLock<HashMap<u64, mpsc::UnboundedSender<WsMessage>>>,
) {
    for action in actions {
        match action {
            RouterAction::SendToConnection { conn_id, event } => {
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode event for {conn_id}: {e}");
                        continue;
                    },
                };

                let senders = senders.read().await;
                match senders.get(&conn_id) {
                    Some(tx) => {
                        if tx.send(WsMessage::Text(text.into())).is_err() {
                            tracing::warn!("send to {conn_id} failed: writer gone");
                        }
                    },
                    None => tracing::warn!("send to {conn_id} failed: connection gone"),
                }
            },

            RouterAction::BroadcastToRoom { room_id, event } => {
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode broadcast for {room_id}: {e}");
                        continue;
                    },
                };

                let members: Vec<u64> = router.members_of(&room_id).collect();
                let senders = senders.read().await;
                for conn_id in members {
                    if let Some(tx) = senders.get(&conn_id) {
                        if tx.send(WsMessage::Text(text.clone().into())).is_err() {
                            tracing::warn!("broadcast to {conn_id} in {room_id} failed");
                        }
                    }
                }
            },

            RouterAction::CloseConnection { conn_id, reason } => {
                tracing::info!("closing connection {conn_id}: {reason}");
                let mut senders = senders.write().await;
                if let Some(tx) = senders.remove(&conn_id) {
                    // Best effort; the reader side tears down the rest.
                    let _ = tx.send(WsMessage::Close(None));
                }
            },

            RouterAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
    }
}
