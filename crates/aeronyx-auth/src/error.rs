//! Error types for aeronyx-auth.

use aeronyx_core::{ErrorKind, WalletType};
use thiserror::Error;

/// Credential acquisition errors.
///
/// `Clone` so that one failed generation can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Wallet declined to sign the challenge")]
    UserRejected,

    #[error("Challenge fetch failed: {0}")]
    ChallengeFetchFailed(String),

    #[error("Invalid {wallet_type} signature format: {reason}")]
    InvalidSignatureFormat {
        wallet_type: WalletType,
        reason: String,
    },

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Map onto the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserRejected => ErrorKind::UserRejectedSignature,
            Self::ChallengeFetchFailed(_) => ErrorKind::Network,
            Self::InvalidSignatureFormat { .. } => ErrorKind::Validation,
            Self::WalletNotConnected | Self::Signing(_) => ErrorKind::Authentication,
        }
    }

    /// Only a failed challenge fetch is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChallengeFetchFailed(_))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Credential persistence errors. Logged, never surfaced to callers of
/// `ensure_credential`.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AuthError::UserRejected.kind(),
            ErrorKind::UserRejectedSignature
        );
        assert!(AuthError::UserRejected.kind().is_terminal());
        assert!(AuthError::ChallengeFetchFailed("503".into()).is_retryable());
        assert!(!AuthError::InvalidSignatureFormat {
            wallet_type: WalletType::Phantom,
            reason: "bad".into()
        }
        .is_retryable());
    }
}
