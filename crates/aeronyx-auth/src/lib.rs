//! Wallet credential management.
//!
//! Obtains a signed server challenge from the connected wallet and hands it
//! out as a bearer `Credential` for REST and WebSocket authentication:
//! - one signing prompt per `(wallet, purpose)` at a time
//! - cached until expiry, optionally persisted across restarts
//! - invalidated on wallet disconnect or address change

pub mod error;
pub mod format;
pub mod manager;
pub mod mock;
pub mod store;
pub mod wallet;

pub use error::{AuthError, AuthResult, PersistError};
pub use format::validate_signature;
pub use manager::{SignatureManager, SignatureManagerConfig, WalletEvent, CREDENTIAL_NAMESPACE};
pub use mock::{MockChallengeProvider, MockSignBehavior, MockWallet};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use wallet::{BoxFuture, Challenge, ChallengeProvider, WalletError, WalletSigner};
