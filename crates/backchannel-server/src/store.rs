//! Room store.
//!
//! Owns the room-id → message-log mapping. Pure data and mutation, no
//! network knowledge; the router decides who hears about a mutation. Rooms
//! are created implicitly on first touch and live for the process lifetime —
//! state is intentionally volatile and never persisted.
//!
//! # Invariants
//!
//! - A room's log only grows, in append order.
//! - Message ids are unique for the process lifetime (time-derived token with
//!   a process-wide sequence suffix, so same-millisecond appends never
//!   collide).
//! - Every read hands out clones; callers can never mutate store-internal
//!   state through a snapshot or a returned message.

use std::collections::HashMap;

use backchannel_proto::{ExportPayload, ExportedMessage, Message, MessageKind, Reply};

use crate::env::Environment;

/// In-memory store of per-room message logs.
#[derive(Debug, Default)]
pub struct RoomStore {
    /// Room id → ordered message log.
    rooms: HashMap<String, Vec<Message>>,
    /// Process-wide id sequence, suffixed onto time-derived id tokens.
    next_seq: u64,
}

impl RoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a room exists, creating an empty log if absent. Idempotent.
    pub fn ensure_room(&mut self, room_id: &str) {
        if !self.rooms.contains_key(room_id) {
            self.rooms.insert(room_id.to_string(), Vec::new());
        }
    }

    /// Whether a room has been created.
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Append a new message to a room's log, creating the room if needed.
    ///
    /// Mints the id and timestamp from `env` and returns a clone of the
    /// stored message (empty reply list). Never fails for well-formed input;
    /// kind validity is enforced at the decode layer.
    pub fn append_message<E: Environment>(
        &mut self,
        room_id: &str,
        kind: MessageKind,
        body: &str,
        env: &E,
    ) -> Message {
        let now = env.now_millis();
        let message = Message {
            id: self.mint_id(now),
            body: body.to_string(),
            kind,
            created_at: now,
            replies: Vec::new(),
        };

        let log = self.rooms.entry(room_id.to_string()).or_default();
        log.push(message.clone());
        message
    }

    /// Append a reply to an existing message in a room.
    ///
    /// Returns a clone of the full updated message so observers receive the
    /// whole aggregate, or `None` if the message id is not in the room's log
    /// (in which case nothing anywhere is mutated).
    pub fn append_reply<E: Environment>(
        &mut self,
        room_id: &str,
        message_id: &str,
        body: &str,
        env: &E,
    ) -> Option<Message> {
        // Resolve the target before minting anything; a missing id must have
        // no side effect, not even a consumed sequence number.
        let index = self.rooms.get(room_id)?.iter().position(|m| m.id == message_id)?;

        let now = env.now_millis();
        let reply_id = self.mint_id(now);

        let message = self.rooms.get_mut(room_id)?.get_mut(index)?;
        message.replies.push(Reply { id: reply_id, body: body.to_string(), created_at: now });
        Some(message.clone())
    }

    /// The room's current log in insertion order, cloned.
    ///
    /// Empty if the room does not exist. Used to replay history to a newly
    /// joined connection.
    pub fn snapshot(&self, room_id: &str) -> Vec<Message> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    /// Export a room's transcript, skipping messages whose kind is excluded.
    ///
    /// Pure read: flattens each surviving message to (timestamp, kind, body,
    /// replies) and stamps the payload with the export time.
    pub fn export_transcript<E: Environment>(
        &self,
        room_id: &str,
        exclude_kinds: &[MessageKind],
        env: &E,
    ) -> ExportPayload {
        let messages = self
            .rooms
            .get(room_id)
            .map(|log| {
                log.iter()
                    .filter(|m| !exclude_kinds.contains(&m.kind))
                    .map(ExportedMessage::from)
                    .collect()
            })
            .unwrap_or_default();

        ExportPayload { room_id: room_id.to_string(), export_time: env.now_millis(), messages }
    }

    /// Number of rooms ever touched.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Length of a room's log. Zero if the room does not exist.
    pub fn message_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, Vec::len)
    }

    /// Time-derived id token: unix millis plus a process-wide sequence.
    fn mint_id(&mut self, now_millis: u64) -> String {
        self.next_seq += 1;
        format!("{now_millis}-{}", self.next_seq)
    }
}
