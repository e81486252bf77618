//! Connection registry for room membership tracking.
//!
//! Maintains bidirectional mappings: room → connections (for fan-out) and
//! connection → rooms (for cleanup on disconnect). Purely structural — no
//! message content ever passes through here.
//!
//! A connection may be a member of any number of rooms; joining is
//! idempotent. Unregistering a connection removes all its memberships.

use std::collections::{HashMap, HashSet};

/// Registry of live connections and their room memberships.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Live connection ids.
    connections: HashSet<u64>,
    /// Room id → member connection ids.
    room_members: HashMap<String, HashSet<u64>>,
    /// Connection id → joined room ids.
    connection_rooms: HashMap<u64, HashSet<String>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection.
    ///
    /// Returns `false` if the id is already registered.
    pub fn register(&mut self, conn_id: u64) -> bool {
        if !self.connections.insert(conn_id) {
            return false;
        }
        self.connection_rooms.insert(conn_id, HashSet::new());
        true
    }

    /// Whether a connection is registered.
    pub fn is_registered(&self, conn_id: u64) -> bool {
        self.connections.contains(&conn_id)
    }

    /// Record room membership for a connection. Idempotent.
    ///
    /// Returns `false` if the connection is not registered.
    pub fn join(&mut self, conn_id: u64, room_id: &str) -> bool {
        if !self.connections.contains(&conn_id) {
            return false;
        }

        self.room_members.entry(room_id.to_string()).or_default().insert(conn_id);
        self.connection_rooms.entry(conn_id).or_default().insert(room_id.to_string());
        true
    }

    /// Remove a connection and all its memberships.
    ///
    /// Returns the rooms it was in, or `None` for unknown ids (a no-op;
    /// disconnect handling must never fail). Rooms left with no members have
    /// their empty membership set removed.
    pub fn leave_all(&mut self, conn_id: u64) -> Option<HashSet<String>> {
        if !self.connections.remove(&conn_id) {
            return None;
        }
        let rooms = self.connection_rooms.remove(&conn_id).unwrap_or_default();

        for room_id in &rooms {
            if let Some(members) = self.room_members.get_mut(room_id) {
                members.remove(&conn_id);
                if members.is_empty() {
                    self.room_members.remove(room_id);
                }
            }
        }

        Some(rooms)
    }

    /// Whether a connection is a member of a room.
    pub fn is_member(&self, conn_id: u64, room_id: &str) -> bool {
        self.room_members.get(room_id).is_some_and(|m| m.contains(&conn_id))
    }

    /// Current fan-out target set for a room. Empty if nobody is joined.
    pub fn members_of(&self, room_id: &str) -> impl Iterator<Item = u64> + '_ {
        self.room_members.get(room_id).into_iter().flat_map(|m| m.iter().copied())
    }

    /// All rooms a connection has joined.
    pub fn rooms_of(&self, conn_id: u64) -> impl Iterator<Item = &str> {
        self.connection_rooms.get(&conn_id).into_iter().flat_map(|r| r.iter().map(String::as_str))
    }

    /// Total number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of members in a room.
    pub fn room_member_count(&self, room_id: &str) -> usize {
        self.room_members.get(room_id).map_or(0, HashSet::len)
    }
}
