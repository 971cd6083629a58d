//! Capabilities the signature manager depends on.
//!
//! Both traits return boxed futures so they stay dyn-compatible and can be
//! shared as `Arc<dyn _>` between the REST client, the WebSocket manager and
//! tests.

use aeronyx_core::WalletType;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Wallet-side signing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The owner declined the prompt.
    Rejected,
    /// No account is connected.
    NotConnected,
    /// Anything else the wallet reported.
    Failed(String),
}

impl std::fmt::Display for WalletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected => write!(f, "rejected by user"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for WalletError {}

/// A connected wallet able to sign arbitrary messages.
pub trait WalletSigner: Send + Sync {
    /// Current account address, `None` when disconnected.
    fn address(&self) -> Option<String>;

    fn wallet_type(&self) -> WalletType;

    fn is_connected(&self) -> bool;

    /// Sign `message`. For EVM wallets this is a personal-sign.
    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>>;
}

/// Server-issued message to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Source of challenges, keyed by wallet address.
pub trait ChallengeProvider: Send + Sync {
    fn fetch_challenge(&self, wallet_address: &str) -> BoxFuture<'_, Result<Challenge, String>>;
}
