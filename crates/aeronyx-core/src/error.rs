//! Error types for aeronyx-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid wallet type: {0}")]
    InvalidWalletType(String),

    #[error("Invalid node status: {0}")]
    InvalidNodeStatus(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error taxonomy shared by the REST client, the WebSocket client and the
/// signature manager.
///
/// Every crate-level error maps onto one of these kinds so callers can decide
/// between "retry", "show a retry affordance" and "explain and stop".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure (DNS, connect, reset).
    Network,
    /// The operation did not complete within its deadline.
    Timeout,
    /// Bad or expired credential.
    Authentication,
    /// Credential is valid but not allowed to do this.
    Authorization,
    /// Request shape rejected by the server.
    Validation,
    /// Server-side failure (5xx).
    Server,
    /// Too many requests.
    RateLimit,
    /// Circuit breaker is open; no I/O was attempted.
    CircuitOpen,
    /// The wallet owner declined to sign.
    UserRejectedSignature,
    /// Target node does not have remote management enabled.
    RemoteNotEnabled,
}

impl ErrorKind {
    /// Transient kinds are retried locally with backoff before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Server | Self::RateLimit
        )
    }

    /// Terminal kinds are shown with an explanation and no retry affordance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UserRejectedSignature | Self::RemoteNotEnabled)
    }

    /// Map an HTTP status code onto the taxonomy.
    ///
    /// Returns `None` for success codes.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            200..=399 => None,
            401 => Some(Self::Authentication),
            403 => Some(Self::Authorization),
            408 => Some(Self::Timeout),
            429 => Some(Self::RateLimit),
            500..=599 => Some(Self::Server),
            _ => Some(Self::Validation),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::RateLimit => "rate_limit",
            Self::CircuitOpen => "circuit_open",
            Self::UserRejectedSignature => "user_rejected_signature",
            Self::RemoteNotEnabled => "remote_not_enabled",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());

        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Authorization.is_retryable());
        assert!(!ErrorKind::UserRejectedSignature.is_retryable());
        assert!(!ErrorKind::CircuitOpen.is_retryable());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(ErrorKind::UserRejectedSignature.is_terminal());
        assert!(ErrorKind::RemoteNotEnabled.is_terminal());
        assert!(!ErrorKind::Server.is_terminal());
    }

    #[test]
    fn test_from_http_status() {
        assert_eq!(ErrorKind::from_http_status(200), None);
        assert_eq!(ErrorKind::from_http_status(204), None);
        assert_eq!(ErrorKind::from_http_status(400), Some(ErrorKind::Validation));
        assert_eq!(ErrorKind::from_http_status(401), Some(ErrorKind::Authentication));
        assert_eq!(ErrorKind::from_http_status(403), Some(ErrorKind::Authorization));
        assert_eq!(ErrorKind::from_http_status(404), Some(ErrorKind::Validation));
        assert_eq!(ErrorKind::from_http_status(408), Some(ErrorKind::Timeout));
        assert_eq!(ErrorKind::from_http_status(429), Some(ErrorKind::RateLimit));
        assert_eq!(ErrorKind::from_http_status(502), Some(ErrorKind::Server));
    }
}
