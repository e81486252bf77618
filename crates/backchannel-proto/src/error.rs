//! Protocol error types.

/// Errors from encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Inbound frame was not valid JSON or did not match any known event
    /// shape. The frame is dropped without mutating server state.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Whether the error came from decoding client input (as opposed to a
    /// server-side encoding bug).
    pub fn is_decode(&self) -> bool {
        match self {
            Self::InvalidFrame(e) => e.is_syntax() || e.is_data() || e.is_eof(),
        }
    }
}
