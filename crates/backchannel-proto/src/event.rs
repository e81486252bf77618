//! Inbound and outbound event sets.
//!
//! Both directions are closed enums, adjacently tagged on the wire as
//! `{"event": <name>, "data": <payload>}`. Dispatch over [`ClientEvent`] is
//! exhaustive, so adding an event is a compile-time-visible change
//! everywhere it must be handled.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one wire name.
//! - Decoding never partially succeeds: a frame either yields a complete
//!   event or a [`ProtocolError`] with no other effect.

use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    message::{ExportPayload, Message, MessageKind},
};

/// Events a client may send to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a room, creating it if absent. The server replies with a full
    /// history snapshot to this connection only.
    JoinRoom(String),

    /// Post a message to a room; fanned out to every room member.
    #[serde(rename_all = "camelCase")]
    SendReaction {
        /// Target room.
        room_id: String,
        /// Message text.
        #[serde(rename = "message")]
        body: String,
        /// Message classification.
        #[serde(rename = "type")]
        kind: MessageKind,
    },

    /// Attach a threaded reply to an existing message.
    #[serde(rename_all = "camelCase")]
    SendReply {
        /// Target room.
        room_id: String,
        /// Id of the message being replied to.
        message_id: String,
        /// Reply text.
        #[serde(rename = "reply")]
        body: String,
    },

    /// Request a transcript of the room (reactions excluded), returned to
    /// this connection only.
    #[serde(rename_all = "camelCase")]
    ExportChat {
        /// Room to export.
        room_id: String,
    },
}

impl ClientEvent {
    /// Decode a wire frame.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode to a wire frame. Used by clients and tests.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Events the server may send to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full history snapshot for a just-joined connection, in log order.
    RoomMessages(Vec<Message>),

    /// A newly posted message, broadcast to the room.
    NewReaction(Message),

    /// A message whose reply list grew, broadcast in full to the room.
    MessageUpdated(Message),

    /// A transcript export, sent to the requesting connection only.
    ChatExported(ExportPayload),

    /// A request-scoped failure surfaced to the sender only.
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Encode to a wire frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a wire frame. Used by clients and tests.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Payload of a [`ServerEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorPayload {
    /// A `send-reply` targeted a message id that does not exist in the room.
    pub fn reply_target_not_found(room_id: &str, message_id: &str) -> Self {
        Self {
            code: "reply-target-not-found".to_string(),
            message: format!("no message {message_id} in room {room_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_join_room() {
        let event = ClientEvent::from_json(r#"{"event":"join-room","data":"R1"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinRoom("R1".to_string()));
    }

    #[test]
    fn decodes_send_reaction() {
        let text = r#"{"event":"send-reaction","data":{"roomId":"R1","message":"👍","type":"reaction"}}"#;
        let event = ClientEvent::from_json(text).unwrap();
        assert_eq!(event, ClientEvent::SendReaction {
            room_id: "R1".to_string(),
            body: "👍".to_string(),
            kind: MessageKind::Reaction,
        });
    }

    #[test]
    fn decodes_send_reply() {
        let text =
            r#"{"event":"send-reply","data":{"roomId":"R1","messageId":"17-3","reply":"same"}}"#;
        let event = ClientEvent::from_json(text).unwrap();
        assert_eq!(event, ClientEvent::SendReply {
            room_id: "R1".to_string(),
            message_id: "17-3".to_string(),
            body: "same".to_string(),
        });
    }

    #[test]
    fn decodes_export_chat() {
        let event =
            ClientEvent::from_json(r#"{"event":"export-chat","data":{"roomId":"R1"}}"#).unwrap();
        assert_eq!(event, ClientEvent::ExportChat { room_id: "R1".to_string() });
    }

    #[test]
    fn rejects_unknown_event_name() {
        assert!(ClientEvent::from_json(r#"{"event":"drop-tables","data":"x"}"#).is_err());
    }

    #[test]
    fn rejects_unknown_message_kind() {
        let text = r#"{"event":"send-reaction","data":{"roomId":"R1","message":"hi","type":"shout"}}"#;
        assert!(ClientEvent::from_json(text).is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        let text = r#"{"event":"send-reply","data":{"roomId":"R1"}}"#;
        assert!(ClientEvent::from_json(text).is_err());
    }

    #[test]
    fn server_event_wire_names() {
        let event = ServerEvent::RoomMessages(vec![]);
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "room-messages");

        let event = ServerEvent::Error(ErrorPayload::reply_target_not_found("R1", "9-9"));
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["code"], "reply-target-not-found");
    }
}
