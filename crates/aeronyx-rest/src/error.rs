//! REST error type.

use aeronyx_core::ErrorKind;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Body `code` marking a node without remote management.
pub const REMOTE_NOT_ENABLED: &str = "REMOTE_NOT_ENABLED";

/// A failed REST call. Never a panic, always one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Server-provided error code.
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    pub fn circuit_open() -> Self {
        Self::new(ErrorKind::CircuitOpen, "circuit breaker is open")
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Classify a transport failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        Self::new(kind, err.to_string())
    }

    /// Classify an error response (or a `success: false` envelope).
    pub fn from_response(status: u16, body: &Value) -> Self {
        let code = body
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string);

        let kind = if code.as_deref() == Some(REMOTE_NOT_ENABLED) {
            ErrorKind::RemoteNotEnabled
        } else {
            ErrorKind::from_http_status(status).unwrap_or(ErrorKind::Validation)
        };

        let message = ["message", "error", "detail"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| body.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            kind,
            message,
            status: Some(status),
            code,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
