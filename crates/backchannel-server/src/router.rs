//! Room router.
//!
//! Ties together the [`RoomStore`] (message logs) and the
//! [`ConnectionRegistry`] (room membership) behind one event-driven state
//! machine. The router is sans-IO: it consumes [`RouterEvent`]s and returns
//! [`RouterAction`]s for the runtime to execute, so every protocol path is
//! testable without a socket.
//!
//! Each event is handled to completion (mutate, then compute fan-out) before
//! the next, which is what keeps all clients' views of a room consistent.

use backchannel_proto::{ClientEvent, ErrorPayload, MessageKind, ServerEvent};

use crate::{
    env::Environment, error::RouterError, registry::ConnectionRegistry, store::RoomStore,
};

/// Message kinds excluded from transcript exports.
const EXPORT_EXCLUDED_KINDS: &[MessageKind] = &[MessageKind::Reaction];

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum concurrent connections; further opens are refused.
    pub max_connections: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events the router processes.
///
/// Produced by the runtime from transport activity.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A new connection was accepted by the transport.
    ConnectionOpened {
        /// Unique connection id assigned by the runtime.
        conn_id: u64,
    },

    /// A decoded client event arrived on a connection.
    ClientEventReceived {
        /// Connection that sent the event.
        conn_id: u64,
        /// The decoded event.
        event: ClientEvent,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        conn_id: u64,
        /// Reason for closure.
        reason: String,
    },
}

/// Actions the router produces.
///
/// Executed by runtime-specific code; the router never touches a socket.
#[derive(Debug, Clone)]
pub enum RouterAction {
    /// Send an event to one connection.
    SendToConnection {
        /// Target connection id.
        conn_id: u64,
        /// Event to send.
        event: ServerEvent,
    },

    /// Broadcast an event to every current member of a room.
    ///
    /// The runtime resolves the member set via [`RoomRouter::members_of`] at
    /// execution time.
    BroadcastToRoom {
        /// Target room id.
        room_id: String,
        /// Event to broadcast.
        event: ServerEvent,
    },

    /// Close a connection.
    CloseConnection {
        /// Connection to close.
        conn_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message for operators.
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for router actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Event-to-action room router.
///
/// Owns all per-room message state and all membership state for the process.
/// Created at startup, passed by reference to whatever handles transport
/// events, torn down at shutdown — no ambient/static state.
#[derive(Debug)]
pub struct RoomRouter<E: Environment> {
    /// Per-room message logs.
    store: RoomStore,
    /// Connection/room membership.
    registry: ConnectionRegistry,
    /// Environment (wall clock, RNG).
    env: E,
    /// Router configuration.
    config: RouterConfig,
}

impl<E: Environment> RoomRouter<E> {
    /// Create a new router.
    pub fn new(env: E, config: RouterConfig) -> Self {
        Self { store: RoomStore::new(), registry: ConnectionRegistry::new(), env, config }
    }

    /// Process one router event and return the actions to execute.
    ///
    /// This is the single entry point: all mutation of store and registry
    /// state happens inside one call, so the caller only has to serialize
    /// calls to keep a room's log free of interleaved mutation.
    pub fn process_event(&mut self, event: RouterEvent) -> Result<Vec<RouterAction>, RouterError> {
        match event {
            RouterEvent::ConnectionOpened { conn_id } => self.handle_connection_opened(conn_id),
            RouterEvent::ClientEventReceived { conn_id, event } => {
                self.handle_client_event(conn_id, event)
            },
            RouterEvent::ConnectionClosed { conn_id, reason } => {
                self.handle_connection_closed(conn_id, &reason)
            },
        }
    }

    fn handle_connection_opened(&mut self, conn_id: u64) -> Result<Vec<RouterAction>, RouterError> {
        if self.registry.connection_count() >= self.config.max_connections {
            return Ok(vec![RouterAction::CloseConnection {
                conn_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        if !self.registry.register(conn_id) {
            return Err(RouterError::ConnectionAlreadyExists(conn_id));
        }

        Ok(vec![RouterAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {conn_id} opened"),
        }])
    }

    fn handle_client_event(
        &mut self,
        conn_id: u64,
        event: ClientEvent,
    ) -> Result<Vec<RouterAction>, RouterError> {
        if !self.registry.is_registered(conn_id) {
            return Err(RouterError::ConnectionNotFound(conn_id));
        }

        let actions = match event {
            ClientEvent::JoinRoom(room_id) => {
                self.registry.join(conn_id, &room_id);
                self.store.ensure_room(&room_id);

                // Snapshot replay: full history to the joiner only, so the
                // join protocol stays stateless.
                let snapshot = self.store.snapshot(&room_id);
                vec![
                    RouterAction::Log {
                        level: LogLevel::Debug,
                        message: format!(
                            "connection {conn_id} joined room {room_id} ({} messages replayed)",
                            snapshot.len()
                        ),
                    },
                    RouterAction::SendToConnection {
                        conn_id,
                        event: ServerEvent::RoomMessages(snapshot),
                    },
                ]
            },

            ClientEvent::SendReaction { room_id, body, kind } => {
                self.store.ensure_room(&room_id);
                let message = self.store.append_message(&room_id, kind, &body, &self.env);

                vec![
                    RouterAction::Log {
                        level: LogLevel::Debug,
                        message: format!(
                            "message {} ({kind:?}) appended to room {room_id}",
                            message.id
                        ),
                    },
                    RouterAction::BroadcastToRoom {
                        room_id,
                        event: ServerEvent::NewReaction(message),
                    },
                ]
            },

            ClientEvent::SendReply { room_id, message_id, body } => {
                match self.store.append_reply(&room_id, &message_id, &body, &self.env) {
                    Some(message) => vec![RouterAction::BroadcastToRoom {
                        room_id,
                        event: ServerEvent::MessageUpdated(message),
                    }],
                    // Nothing was mutated; tell the sender and nobody else.
                    None => vec![
                        RouterAction::Log {
                            level: LogLevel::Warn,
                            message: format!(
                                "connection {conn_id} replied to unknown message {message_id} in room {room_id}"
                            ),
                        },
                        RouterAction::SendToConnection {
                            conn_id,
                            event: ServerEvent::Error(ErrorPayload::reply_target_not_found(
                                &room_id,
                                &message_id,
                            )),
                        },
                    ],
                }
            },

            ClientEvent::ExportChat { room_id } => {
                let payload =
                    self.store.export_transcript(&room_id, EXPORT_EXCLUDED_KINDS, &self.env);
                vec![
                    RouterAction::Log {
                        level: LogLevel::Info,
                        message: format!(
                            "room {room_id} exported ({} messages) for connection {conn_id}",
                            payload.messages.len()
                        ),
                    },
                    RouterAction::SendToConnection {
                        conn_id,
                        event: ServerEvent::ChatExported(payload),
                    },
                ]
            },
        };

        Ok(actions)
    }

    fn handle_connection_closed(
        &mut self,
        conn_id: u64,
        reason: &str,
    ) -> Result<Vec<RouterAction>, RouterError> {
        let Some(rooms) = self.registry.leave_all(conn_id) else {
            // Already gone; disconnect handling never fails.
            return Ok(Vec::new());
        };

        Ok(vec![RouterAction::Log {
            level: LogLevel::Info,
            message: format!(
                "connection {conn_id} closed: {reason}, was in {} rooms",
                rooms.len()
            ),
        }])
    }

    /// Current fan-out target set for a room.
    ///
    /// Used by the runtime to execute [`RouterAction::BroadcastToRoom`].
    pub fn members_of(&self, room_id: &str) -> impl Iterator<Item = u64> + '_ {
        self.registry.members_of(room_id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Read access to the room store, for stats and tests.
    pub fn store(&self) -> &RoomStore {
        &self.store
    }
}
