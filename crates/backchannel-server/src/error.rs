//! Router error types.
//!
//! Errors here are per-event: they mean one inbound event was dropped, never
//! that the process is unhealthy. The runtime logs them and keeps serving
//! every other connection.

use backchannel_proto::ProtocolError;

/// Errors from router event processing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Event referenced a connection the registry does not know.
    ///
    /// Usually a race with disconnect: the connection closed while its last
    /// frames were still in flight. Safe to drop.
    #[error("connection not found: {0}")]
    ConnectionNotFound(u64),

    /// A connection id was opened twice.
    ///
    /// Connection ids are random 64-bit tokens minted by the runtime; a
    /// duplicate indicates a runtime bug, not client misbehavior.
    #[error("connection already exists: {0}")]
    ConnectionAlreadyExists(u64),

    /// Wire frame could not be decoded or encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
