//! In-process wallet and challenge provider for tests.

use crate::wallet::{BoxFuture, Challenge, ChallengeProvider, WalletError, WalletSigner};
use aeronyx_core::{SignatureScheme, WalletType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// What the next `sign_message` call does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockSignBehavior {
    /// Produce a well-formed signature for the wallet type.
    Sign,
    /// Decline the prompt.
    Reject,
    /// Return a signature in the wrong encoding.
    Malformed,
    /// Fail with a wallet error.
    Fail(String),
}

/// Mock wallet that records signing prompts.
#[derive(Debug)]
pub struct MockWallet {
    address: Mutex<Option<String>>,
    wallet_type: WalletType,
    connected: AtomicBool,
    behavior: Mutex<MockSignBehavior>,
    delay: Duration,
    sign_count: AtomicUsize,
}

impl MockWallet {
    pub fn new(address: impl Into<String>, wallet_type: WalletType) -> Self {
        Self {
            address: Mutex::new(Some(address.into())),
            wallet_type,
            connected: AtomicBool::new(true),
            behavior: Mutex::new(MockSignBehavior::Sign),
            delay: Duration::ZERO,
            sign_count: AtomicUsize::new(0),
        }
    }

    /// Make every signing prompt take `delay` to answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_behavior(&self, behavior: MockSignBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_address(&self, address: Option<String>) {
        *self.address.lock() = address;
    }

    /// Number of signing prompts shown so far.
    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::SeqCst)
    }

    fn signature_for(&self, message: &str) -> String {
        let seed = message.as_bytes();
        let fill = |n: usize| -> Vec<u8> {
            (0..n)
                .map(|i| seed.get(i % seed.len().max(1)).copied().unwrap_or(0))
                .collect()
        };
        match self.wallet_type.scheme() {
            SignatureScheme::HexPrefixed => format!("0x{}", hex::encode(fill(65))),
            SignatureScheme::Base64 => STANDARD.encode(fill(64)),
        }
    }
}

impl WalletSigner for MockWallet {
    fn address(&self) -> Option<String> {
        if self.is_connected() {
            self.address.lock().clone()
        } else {
            None
        }
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
            self.sign_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if !self.is_connected() {
                return Err(WalletError::NotConnected);
            }
            let behavior = self.behavior.lock().clone();
            match behavior {
                MockSignBehavior::Sign => Ok(self.signature_for(&message)),
                MockSignBehavior::Reject => Err(WalletError::Rejected),
                MockSignBehavior::Malformed => Ok("not-a-signature".to_string()),
                MockSignBehavior::Fail(msg) => Err(WalletError::Failed(msg)),
            }
        })
    }
}

/// Challenge provider that issues numbered messages.
#[derive(Debug, Default)]
pub struct MockChallengeProvider {
    fetch_count: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl MockChallengeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl ChallengeProvider for MockChallengeProvider {
    fn fetch_challenge(&self, wallet_address: &str) -> BoxFuture<'_, Result<Challenge, String>> {
        let address = wallet_address.to_string();
        Box::pin(async move {
            let n = self.fetch_count.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err("challenge endpoint unavailable".to_string());
            }
            Ok(Challenge {
                message: format!("Sign in to AeroNyx\nWallet: {address}\nNonce: {n}"),
                timestamp: Some(1_700_000_000 + n as i64),
            })
        })
    }
}
