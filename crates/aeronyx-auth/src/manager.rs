//! Signature manager.
//!
//! Lookup order for `ensure_credential`:
//! 1. the shared cache
//! 2. the persisted copy, re-validated
//! 3. a fresh challenge signed by the wallet
//!
//! Step 3 runs at most once per `(address, purpose)` at a time. Concurrent
//! callers join the same shared future and receive the same result, success
//! or failure, so the wallet never shows two prompts for one slot.

use crate::error::{AuthError, AuthResult};
use crate::format::validate_signature;
use crate::store::CredentialStore;
use crate::wallet::{BoxFuture, ChallengeProvider, WalletError, WalletSigner};
use aeronyx_cache::CacheStore;
use aeronyx_core::{Credential, CredentialKey};
use chrono::Utc;
use futures_util::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Cache namespace holding credentials.
pub const CREDENTIAL_NAMESPACE: &str = "credentials";

#[derive(Debug, Clone)]
pub struct SignatureManagerConfig {
    /// How long a signed challenge is accepted as a credential.
    pub validity: Duration,
}

impl Default for SignatureManagerConfig {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(10 * 60),
        }
    }
}

/// Wallet lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    Disconnected { address: String },
    AddressChanged { previous: String, current: String },
}

type SharedCredential = Shared<BoxFuture<'static, AuthResult<Credential>>>;

struct InFlight {
    id: u64,
    future: SharedCredential,
}

struct Inner {
    config: SignatureManagerConfig,
    challenges: Arc<dyn ChallengeProvider>,
    cache: Arc<CacheStore>,
    persistence: Option<Arc<dyn CredentialStore>>,
    in_flight: Mutex<HashMap<CredentialKey, InFlight>>,
    next_id: AtomicU64,
}

/// Owner of all wallet credentials. Cheap to clone.
#[derive(Clone)]
pub struct SignatureManager {
    inner: Arc<Inner>,
}

impl SignatureManager {
    pub fn new(
        config: SignatureManagerConfig,
        challenges: Arc<dyn ChallengeProvider>,
        cache: Arc<CacheStore>,
        persistence: Option<Arc<dyn CredentialStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                challenges,
                cache,
                persistence,
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Return a valid credential for the wallet's current address and
    /// `purpose`, prompting the wallet only when nothing valid exists.
    pub async fn ensure_credential(
        &self,
        wallet: Arc<dyn WalletSigner>,
        purpose: &str,
    ) -> AuthResult<Credential> {
        let address = match wallet.address() {
            Some(address) if wallet.is_connected() => address,
            _ => return Err(AuthError::WalletNotConnected),
        };
        let key = CredentialKey::new(&address, purpose);

        if let Some(credential) = self.inner.cached(&key) {
            trace!(key = %key, "Credential cache hit");
            return Ok(credential);
        }

        if let Some(credential) = self.inner.load_persisted(&key) {
            info!(key = %key, expires_at = %credential.expires_at, "Restored persisted credential");
            self.inner.cache_credential(&credential);
            return Ok(credential);
        }

        Inner::join_or_start(&self.inner, wallet, address, key).await
    }

    /// Valid cached credential, without prompting.
    pub fn cached_credential(&self, wallet_address: &str, purpose: &str) -> Option<Credential> {
        self.inner.cached(&CredentialKey::new(wallet_address, purpose))
    }

    /// Drop every credential of an address: cached, persisted and in flight.
    pub fn invalidate(&self, wallet_address: &str) -> usize {
        let address = wallet_address.to_ascii_lowercase();

        self.inner
            .in_flight
            .lock()
            .retain(|key, _| key.wallet_address != address);

        let prefix = format!("{address}:");
        let removed = self
            .inner
            .cache
            .delete_where(CREDENTIAL_NAMESPACE, |k| k.starts_with(&prefix));

        if let Some(store) = &self.inner.persistence {
            if let Err(e) = store.remove_address(&address) {
                warn!(wallet = %address, error = %e, "Failed to remove persisted credentials");
            }
        }

        info!(wallet = %address, removed, "Invalidated credentials");
        removed
    }

    /// Drop the credential of one `(address, purpose)` slot.
    pub fn invalidate_purpose(&self, wallet_address: &str, purpose: &str) {
        let key = CredentialKey::new(wallet_address, purpose);

        self.inner.in_flight.lock().remove(&key);
        self.inner
            .cache
            .delete(CREDENTIAL_NAMESPACE, &key.storage_key());

        if let Some(store) = &self.inner.persistence {
            if let Err(e) = store.remove(&key) {
                warn!(key = %key, error = %e, "Failed to remove persisted credential");
            }
        }
        debug!(key = %key, "Invalidated credential");
    }

    pub fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::Disconnected { address } => {
                self.invalidate(&address);
            }
            WalletEvent::AddressChanged { previous, current } => {
                if !previous.eq_ignore_ascii_case(&current) {
                    self.invalidate(&previous);
                }
            }
        }
    }

    /// Number of generations currently waiting on the wallet.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }
}

impl Inner {
    fn join_or_start(
        this: &Arc<Self>,
        wallet: Arc<dyn WalletSigner>,
        address: String,
        key: CredentialKey,
    ) -> SharedCredential {
        let mut in_flight = this.in_flight.lock();

        if let Some(existing) = in_flight.get(&key) {
            debug!(key = %key, "Joining in-flight credential generation");
            return existing.future.clone();
        }

        // A generation may have finished between the cache miss and the lock.
        if let Some(credential) = this.cached(&key) {
            let ready: BoxFuture<'static, AuthResult<Credential>> =
                Box::pin(futures_util::future::ready(Ok(credential)));
            return ready.shared();
        }

        let id = this.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(this);
        let task_key = key.clone();
        let generation: BoxFuture<'static, AuthResult<Credential>> = Box::pin(async move {
            let result = inner.generate(wallet.as_ref(), &address, &task_key).await;
            inner.complete(&task_key, id, &result);
            result
        });

        let shared = generation.shared();
        in_flight.insert(
            key,
            InFlight {
                id,
                future: shared.clone(),
            },
        );
        shared
    }

    async fn generate(
        &self,
        wallet: &dyn WalletSigner,
        address: &str,
        key: &CredentialKey,
    ) -> AuthResult<Credential> {
        let wallet_type = wallet.wallet_type();
        info!(key = %key, wallet_type = %wallet_type, "Requesting signature challenge");

        let challenge = self
            .challenges
            .fetch_challenge(address)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Challenge fetch failed");
                AuthError::ChallengeFetchFailed(e)
            })?;

        let signature = wallet
            .sign_message(&challenge.message)
            .await
            .map_err(|e| match e {
                WalletError::Rejected => {
                    info!(key = %key, "Wallet declined to sign");
                    AuthError::UserRejected
                }
                WalletError::NotConnected => AuthError::WalletNotConnected,
                WalletError::Failed(msg) => AuthError::Signing(msg),
            })?;

        if let Err(e) = validate_signature(wallet_type, &signature) {
            warn!(key = %key, error = %e, "Wallet returned a malformed signature");
            return Err(e);
        }

        // The account may have switched while the prompt was open.
        match wallet.address() {
            Some(current) if current.eq_ignore_ascii_case(address) => {}
            _ => {
                warn!(key = %key, "Wallet address changed during signing");
                return Err(AuthError::WalletNotConnected);
            }
        }

        let validity = chrono::Duration::from_std(self.config.validity)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        let credential = Credential::new(
            address,
            signature,
            challenge.message,
            wallet_type,
            key.purpose.clone(),
            Utc::now(),
            validity,
        );
        info!(key = %key, expires_at = %credential.expires_at, "Credential issued");
        Ok(credential)
    }

    /// Publish the outcome of generation `id` unless it was invalidated
    /// while running.
    fn complete(&self, key: &CredentialKey, id: u64, result: &AuthResult<Credential>) {
        let current = {
            let mut in_flight = self.in_flight.lock();
            let current = in_flight.get(key).is_some_and(|entry| entry.id == id);
            if current {
                // Cache before releasing the slot so a late caller finds it.
                if let Ok(credential) = result {
                    self.cache_credential(credential);
                }
                in_flight.remove(key);
            }
            current
        };

        match (current, result) {
            (true, Ok(credential)) => self.persist(credential),
            (false, Ok(_)) => debug!(key = %key, "Discarding credential invalidated during generation"),
            _ => {}
        }
    }

    fn cached(&self, key: &CredentialKey) -> Option<Credential> {
        self.cache
            .get_as::<Credential>(CREDENTIAL_NAMESPACE, &key.storage_key())
            .filter(Credential::is_valid)
    }

    fn cache_credential(&self, credential: &Credential) {
        let ttl = credential
            .remaining_at(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if ttl.is_zero() {
            return;
        }
        if let Err(e) = self.cache.set_as(
            CREDENTIAL_NAMESPACE,
            &credential.key().storage_key(),
            credential,
            Some(ttl),
        ) {
            warn!(error = %e, "Failed to cache credential");
        }
    }

    fn load_persisted(&self, key: &CredentialKey) -> Option<Credential> {
        let store = self.persistence.as_ref()?;
        let credential = match store.load(key) {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to load persisted credential");
                return None;
            }
        };

        let usable = credential.is_valid()
            && credential.key() == *key
            && validate_signature(credential.wallet_type, &credential.signature).is_ok();
        if usable {
            return Some(credential);
        }

        debug!(key = %key, "Discarding expired or malformed persisted credential");
        if let Err(e) = store.remove(key) {
            warn!(key = %key, error = %e, "Failed to remove persisted credential");
        }
        None
    }

    fn persist(&self, credential: &Credential) {
        if let Some(store) = &self.persistence {
            if let Err(e) = store.save(credential) {
                warn!(key = %credential.key(), error = %e, "Failed to persist credential");
            }
        }
    }
}
