//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake with {endpoint} timed out after {timeout_ms}ms")]
    HandshakeTimeout { endpoint: String, timeout_ms: u64 },

    #[error("Post-connect hook failed: {0}")]
    HookFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

impl WsError {
    /// Whether the peer (or the stream) ended the connection.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }
}

pub type WsResult<T> = Result<T, WsError>;
