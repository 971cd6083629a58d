//! Wallet credentials.
//!
//! A `Credential` is a signed server challenge that both the REST API and the
//! monitoring WebSocket accept as a bearer token until it expires.

use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Signature encoding produced by a wallet family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// `0x`-prefixed hex (EVM personal-sign, 65 bytes).
    HexPrefixed,
    /// Standard base64 (ed25519, 64 bytes).
    Base64,
}

/// Wallet provider type, sent to the backend as `wallet_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    #[default]
    Okx,
    Metamask,
    Phantom,
}

impl WalletType {
    /// Signature encoding this wallet produces.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::Okx | Self::Metamask => SignatureScheme::HexPrefixed,
            Self::Phantom => SignatureScheme::Base64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Okx => "okx",
            Self::Metamask => "metamask",
            Self::Phantom => "phantom",
        }
    }
}

impl std::fmt::Display for WalletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "okx" => Ok(Self::Okx),
            "metamask" => Ok(Self::Metamask),
            "phantom" => Ok(Self::Phantom),
            other => Err(CoreError::InvalidWalletType(other.to_string())),
        }
    }
}

/// Identity of a credential slot: one valid credential per wallet per purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    /// Lower-cased wallet address.
    pub wallet_address: String,
    /// Purpose tag (e.g. "api", "websocket").
    pub purpose: String,
}

impl CredentialKey {
    pub fn new(wallet_address: &str, purpose: &str) -> Self {
        Self {
            wallet_address: wallet_address.to_ascii_lowercase(),
            purpose: purpose.to_string(),
        }
    }

    /// Key used in the cache and in persisted file names.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.wallet_address, self.purpose)
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.wallet_address, self.purpose)
    }
}

/// A wallet signature over a server-issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
    pub wallet_type: WalletType,
    pub purpose: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential valid for `validity` starting at `issued_at`.
    pub fn new(
        wallet_address: impl Into<String>,
        signature: impl Into<String>,
        message: impl Into<String>,
        wallet_type: WalletType,
        purpose: impl Into<String>,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            signature: signature.into(),
            message: message.into(),
            wallet_type,
            purpose: purpose.into(),
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    pub fn key(&self) -> CredentialKey {
        CredentialKey::new(&self.wallet_address, &self.purpose)
    }

    /// Check validity at a given instant (`now < expires_at`).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Remaining lifetime at `now`, zero when expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.expires_at - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    /// Whether the address matches, ignoring case.
    pub fn belongs_to(&self, wallet_address: &str) -> bool {
        self.wallet_address.eq_ignore_ascii_case(wallet_address)
    }
}
