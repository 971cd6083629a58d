//! Application error types.

use crate::wallet::KeyError;
use aeronyx_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet key error: {0}")]
    Key(#[from] KeyError),

    #[error("Credential error: {0}")]
    Auth(#[from] aeronyx_auth::AuthError),

    #[error("API error: {0}")]
    Api(#[from] aeronyx_rest::ApiError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<aeronyx_ws::WsError>),

    #[error("Sync error: {0}")]
    Sync(#[from] aeronyx_sync::SyncError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] aeronyx_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Engine errors map onto the shared taxonomy; local setup errors do not.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Auth(e) => Some(e.kind()),
            Self::Api(e) => Some(e.kind),
            Self::WebSocket(e) => Some(e.kind()),
            Self::Sync(e) => Some(e.kind()),
            Self::Config(_) | Self::Key(_) | Self::Telemetry(_) | Self::Io(_) => None,
        }
    }
}

impl From<aeronyx_ws::WsError> for AppError {
    fn from(e: aeronyx_ws::WsError) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
