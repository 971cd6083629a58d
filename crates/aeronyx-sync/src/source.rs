//! Where REST snapshots come from.

use crate::error::SyncResult;
use crate::normalize::from_overview;
use crate::state::Snapshot;
use aeronyx_auth::{BoxFuture, SignatureManager, WalletSigner};
use aeronyx_core::ErrorKind;
use aeronyx_rest::AeronyxApi;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches full node snapshots on demand.
pub trait SnapshotSource: Send + Sync {
    fn fetch(&self, force_refresh: bool) -> BoxFuture<'_, SyncResult<Snapshot>>;

    /// Wallet the snapshots belong to; keys the persisted copy.
    fn wallet_address(&self) -> Option<String>;
}

/// Nodes overview of the connected wallet.
pub struct RestSnapshotSource {
    api: AeronyxApi,
    signatures: SignatureManager,
    wallet: Arc<dyn WalletSigner>,
    purpose: String,
}

impl RestSnapshotSource {
    pub fn new(
        api: AeronyxApi,
        signatures: SignatureManager,
        wallet: Arc<dyn WalletSigner>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            api,
            signatures,
            wallet,
            purpose: purpose.into(),
        }
    }

    async fn fetch_overview(&self, force_refresh: bool) -> SyncResult<Snapshot> {
        let issued_at = Utc::now();
        let credential = self
            .signatures
            .ensure_credential(Arc::clone(&self.wallet), &self.purpose)
            .await?;

        let overview = match self.api.nodes_overview(&credential, force_refresh).await {
            Ok(overview) => overview,
            Err(e) => {
                if e.kind == ErrorKind::Authentication {
                    warn!(wallet = %credential.wallet_address, "Credential refused, dropping it");
                    self.signatures
                        .invalidate_purpose(&credential.wallet_address, &self.purpose);
                }
                return Err(e.into());
            }
        };

        let records = from_overview(&overview);
        let as_of = overview.server_time().unwrap_or(issued_at);
        debug!(nodes = records.len(), as_of = %as_of, "Fetched nodes overview");
        Ok(Snapshot::rest(records, as_of))
    }
}

impl SnapshotSource for RestSnapshotSource {
    fn fetch(&self, force_refresh: bool) -> BoxFuture<'_, SyncResult<Snapshot>> {
        Box::pin(self.fetch_overview(force_refresh))
    }

    fn wallet_address(&self) -> Option<String> {
        self.wallet.address()
    }
}
