//! Local key-backed EVM wallet.
//!
//! Signs server challenges with EIP-191 personal-sign, the same encoding a
//! browser wallet produces, so the backend cannot tell the two apart.
//! Never log private key material.

use aeronyx_auth::{BoxFuture, WalletError, WalletSigner};
use aeronyx_core::{SignatureScheme, WalletType};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Source of the private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Hex key in an environment variable.
    EnvVar { var_name: String },
    /// Hex key in a file (recommend 0600 permissions).
    File { path: PathBuf },
}

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("{0} wallets do not sign with an EVM key")]
    UnsupportedWalletType(WalletType),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts an optional 0x prefix and surrounding whitespace.
fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let trimmed = hex_str.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

/// `WalletSigner` over a local secp256k1 key.
pub struct LocalWallet {
    signer: PrivateKeySigner,
    /// Lower-cased, 0x-prefixed.
    address: String,
    wallet_type: WalletType,
    connected: AtomicBool,
}

impl LocalWallet {
    /// Load the key from `source`.
    pub fn load(source: &KeySource, wallet_type: WalletType) -> Result<Self, KeyError> {
        let secret: Zeroizing<String> = match source {
            KeySource::EnvVar { var_name } => Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            ),
            KeySource::File { path } => Zeroizing::new(std::fs::read_to_string(path)?),
        };
        let wallet = Self::from_hex(&secret, wallet_type)?;
        info!(address = %wallet.address, wallet_type = %wallet_type, "Loaded local wallet");
        Ok(wallet)
    }

    pub fn from_hex(hex_key: &str, wallet_type: WalletType) -> Result<Self, KeyError> {
        let bytes = parse_hex_key(hex_key)?;
        Self::from_bytes(&bytes, wallet_type)
    }

    pub fn from_bytes(secret_bytes: &[u8], wallet_type: WalletType) -> Result<Self, KeyError> {
        if wallet_type.scheme() != SignatureScheme::HexPrefixed {
            return Err(KeyError::UnsupportedWalletType(wallet_type));
        }
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let address = signer.address().to_string().to_ascii_lowercase();

        Ok(Self {
            signer,
            address,
            wallet_type,
            connected: AtomicBool::new(true),
        })
    }

    /// Stop answering as a connected wallet. Signing fails afterwards.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(address = %self.address, "Local wallet disconnected");
        }
    }
}

impl WalletSigner for LocalWallet {
    fn address(&self) -> Option<String> {
        self.is_connected().then(|| self.address.clone())
    }

    fn wallet_type(&self) -> WalletType {
        self.wallet_type
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>> {
        let message = message.to_string();
        Box::pin(async move {
            if !self.is_connected() {
                return Err(WalletError::NotConnected);
            }
            let signature = AlloySigner::sign_message(&self.signer, message.as_bytes())
                .await
                .map_err(|e| WalletError::Failed(e.to_string()))?;
            Ok(format!("0x{}", hex::encode(signature.as_bytes())))
        })
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("wallet_type", &self.wallet_type)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
