//! Client error type.
//!
//! Every failure here is recoverable: the controller turns it into a user
//! notice and keeps running.

use tokio_tungstenite::tungstenite;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing room id or user name.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The HTTP request itself failed (DNS, connect, decode).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Malformed frame or unexpected handshake reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker sent an ERROR frame.
    #[error("broker error: {0}")]
    Broker(String),

    #[error("timed out while {0}")]
    Timeout(String),

    #[error("not connected to a room")]
    NotConnected,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url `{url}`: {reason}")]
    Url { url: String, reason: String },
}

impl ChatError {
    /// HTTP status of an [`ChatError::Api`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
