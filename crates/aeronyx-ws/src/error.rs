//! WebSocket error types.

use aeronyx_auth::AuthError;
use aeronyx_core::ErrorKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Socket is not open")]
    NotOpen,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Authentication failed: code={code}, message={message}")]
    AuthFailed { code: String, message: String },

    #[error("Authentication timed out after {0:?}")]
    AuthTimeout(Duration),

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Request dropped before a response arrived")]
    RequestCancelled,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Credential error: {0}")]
    Credential(#[from] AuthError),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Map onto the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotOpen
            | Self::ConnectionFailed(_)
            | Self::ConnectionClosed { .. }
            | Self::HeartbeatTimeout
            | Self::RequestCancelled
            | Self::Tungstenite(_) => ErrorKind::Network,
            Self::AuthFailed { .. } => ErrorKind::Authentication,
            Self::AuthTimeout(_) | Self::RequestTimeout(_) => ErrorKind::Timeout,
            Self::InvalidFrame(_) | Self::Json(_) => ErrorKind::Validation,
            Self::Credential(e) => e.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type WsResult<T> = Result<T, WsError>;
