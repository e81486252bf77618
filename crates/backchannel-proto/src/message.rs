//! Room message data model.
//!
//! A room owns an ordered, append-only log of [`Message`]s. A message is
//! immutable after creation except for its reply list, which only grows.
//! The server mints ids and timestamps; clients never supply either.

use serde::{Deserialize, Serialize};

/// Classification of a room message, fixed at creation.
///
/// Serialized in lowercase on the wire (`"reaction"`, `"question"`,
/// `"comment"`). Any other string fails deserialization, which is how
/// malformed kinds are rejected before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A lightweight, transient reaction (emoji and the like). Excluded from
    /// transcript exports.
    Reaction,
    /// A question for the room.
    Question,
    /// A freeform comment.
    Comment,
}

/// A threaded response attached to exactly one [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Process-unique, time-derived token.
    pub id: String,
    /// Reply text.
    #[serde(rename = "message")]
    pub body: String,
    /// Server-assigned receipt time, unix milliseconds.
    #[serde(rename = "timestamp")]
    pub created_at: u64,
}

/// A single entry in a room's message log.
///
/// Owned exclusively by its room; never moves between rooms. `replies` is
/// append-only and in receipt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Process-unique, time-derived token.
    pub id: String,
    /// Message text.
    #[serde(rename = "message")]
    pub body: String,
    /// Message classification, fixed at creation.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Server-assigned receipt time, unix milliseconds.
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Threaded replies, in receipt order. Empty at creation.
    pub replies: Vec<Reply>,
}

/// A message flattened for transcript export.
///
/// Drops the id (exports are read-only artifacts, nothing replies to them)
/// and keeps timestamp, kind, body, and the reply thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedMessage {
    /// Original receipt time of the message, unix milliseconds.
    pub timestamp: u64,
    /// Message classification.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Message text.
    #[serde(rename = "message")]
    pub body: String,
    /// The full reply thread, in receipt order.
    pub replies: Vec<Reply>,
}

impl From<&Message> for ExportedMessage {
    fn from(msg: &Message) -> Self {
        Self {
            timestamp: msg.created_at,
            kind: msg.kind,
            body: msg.body.clone(),
            replies: msg.replies.clone(),
        }
    }
}

/// A room transcript produced by `export-chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    /// The exported room.
    pub room_id: String,
    /// When the export was taken, unix milliseconds.
    pub export_time: u64,
    /// Non-excluded messages in log order.
    pub messages: Vec<ExportedMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&MessageKind::Reaction).unwrap(), "\"reaction\"");
        assert_eq!(serde_json::to_string(&MessageKind::Question).unwrap(), "\"question\"");
        assert_eq!(serde_json::to_string(&MessageKind::Comment).unwrap(), "\"comment\"");
    }

    #[test]
    fn unknown_kind_fails_to_decode() {
        let result: Result<MessageKind, _> = serde_json::from_str("\"shout\"");
        assert!(result.is_err());
    }

    #[test]
    fn message_uses_client_facing_field_names() {
        let msg = Message {
            id: "1700000000000-1".to_string(),
            body: "why rust?".to_string(),
            kind: MessageKind::Question,
            created_at: 1_700_000_000_000,
            replies: vec![Reply {
                id: "1700000000001-2".to_string(),
                body: "why not".to_string(),
                created_at: 1_700_000_000_001,
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["message"], "why rust?");
        assert_eq!(json["type"], "question");
        assert_eq!(json["timestamp"], 1_700_000_000_000_u64);
        assert_eq!(json["replies"][0]["message"], "why not");
    }

    #[test]
    fn exported_message_flattens_and_keeps_replies() {
        let msg = Message {
            id: "1-1".to_string(),
            body: "q".to_string(),
            kind: MessageKind::Question,
            created_at: 42,
            replies: vec![Reply { id: "2-2".to_string(), body: "a".to_string(), created_at: 43 }],
        };

        let exported = ExportedMessage::from(&msg);
        assert_eq!(exported.timestamp, 42);
        assert_eq!(exported.kind, MessageKind::Question);
        assert_eq!(exported.replies.len(), 1);

        let json: serde_json::Value = serde_json::to_value(&exported).unwrap();
        assert!(json.get("id").is_none());
    }
}
