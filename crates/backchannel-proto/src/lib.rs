//! Wire contract for the backchannel room server.
//!
//! Clients and server exchange JSON text frames, each an adjacently tagged
//! object: `{"event": <name>, "data": <payload>}`. The event name determines
//! the payload shape; unknown names and malformed payloads fail decoding
//! before any server state is touched.
//!
//! This crate is pure data: no I/O, no async. It defines the message data
//! model ([`Message`], [`Reply`], [`MessageKind`]), the closed inbound and
//! outbound event sets ([`ClientEvent`], [`ServerEvent`]), and the transcript
//! export payload ([`ExportPayload`]).

mod error;
mod event;
mod message;

pub use error::ProtocolError;
pub use event::{ClientEvent, ErrorPayload, ServerEvent};
pub use message::{ExportPayload, ExportedMessage, Message, MessageKind, Reply};
