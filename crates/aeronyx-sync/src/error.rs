//! Reconciler error types.

use aeronyx_auth::AuthError;
use aeronyx_core::ErrorKind;
use aeronyx_rest::ApiError;
use thiserror::Error;

/// `Clone` so one failed refresh can answer every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Credential error: {0}")]
    Credential(#[from] AuthError),

    #[error("Snapshot fetch failed: {0}")]
    Api(#[from] ApiError),

    #[error("Reconciler stopped")]
    Stopped,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Credential(e) => e.kind(),
            Self::Api(e) => e.kind,
            Self::Stopped => ErrorKind::Network,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
