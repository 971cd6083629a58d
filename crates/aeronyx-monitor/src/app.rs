//! Application wiring.
//!
//! Builds the shared cache, the signature manager, the REST API, the
//! WebSocket connection and the reconciler from one `AppConfig`, then either
//! runs the live monitor until Ctrl+C or answers a one-shot query.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::wallet::LocalWallet;
use aeronyx_auth::{
    ChallengeProvider, CredentialStore, FileCredentialStore, SignatureManager,
    SignatureManagerConfig, WalletSigner,
};
use aeronyx_cache::CacheStore;
use aeronyx_core::{Credential, DataQuality, DataSource, ErrorKind};
use aeronyx_rest::{
    AeronyxApi, ApiError, NodeCatalogItem, NodeDetailedStatus, PerformanceHistory, RestClient,
};
use aeronyx_sync::{
    spawn_reconciler, spawn_ws_bridge, DashboardView, ReconcilerState, RestSnapshotSource,
    SnapshotSource,
};
use aeronyx_ws::{ConnectionManager, ConnectionState, WsEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Main application.
pub struct Application {
    config: AppConfig,
    cache: Arc<CacheStore>,
    api: AeronyxApi,
    signatures: SignatureManager,
    wallet: Arc<LocalWallet>,
    cancel: CancellationToken,
}

impl Application {
    /// Load the wallet named by the config and build the application.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let wallet = LocalWallet::load(&config.wallet.key_source(), config.wallet.wallet_type)?;
        Self::new(config, Arc::new(wallet))
    }

    pub fn new(config: AppConfig, wallet: Arc<LocalWallet>) -> AppResult<Self> {
        let cache = Arc::new(CacheStore::new(config.cache.to_cache_config()));
        let api = AeronyxApi::new(RestClient::new(config.api.clone(), cache.clone())?);

        let persistence: Option<Arc<dyn CredentialStore>> = match &config.auth.credential_dir {
            Some(dir) => {
                let store = FileCredentialStore::new(dir).map_err(|e| {
                    AppError::Config(format!(
                        "Failed to open credential dir {}: {e}",
                        dir.display()
                    ))
                })?;
                Some(Arc::new(store))
            }
            None => None,
        };
        let challenges: Arc<dyn ChallengeProvider> = Arc::new(api.clone());
        let signatures = SignatureManager::new(
            SignatureManagerConfig {
                validity: config.auth.validity(),
            },
            challenges,
            cache.clone(),
            persistence,
        );

        info!(
            api = %api.client().base_url(),
            ws = %config.websocket.url,
            persist_credentials = config.auth.credential_dir.is_some(),
            "Application initialized"
        );

        Ok(Self {
            config,
            cache,
            api,
            signatures,
            wallet,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cancelling stops `run` as if Ctrl+C had been pressed.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn signer(&self) -> Arc<dyn WalletSigner> {
        self.wallet.clone()
    }

    fn purpose(&self) -> &str {
        &self.config.dashboard.auth_purpose
    }

    fn snapshot_source(&self) -> RestSnapshotSource {
        RestSnapshotSource::new(
            self.api.clone(),
            self.signatures.clone(),
            self.signer(),
            self.purpose().to_string(),
        )
    }

    async fn credential(&self) -> AppResult<Credential> {
        Ok(self
            .signatures
            .ensure_credential(self.signer(), self.purpose())
            .await?)
    }

    /// A rejected credential is dropped so the next call signs again.
    fn api_error(&self, e: ApiError) -> AppError {
        if e.kind == ErrorKind::Authentication {
            if let Some(address) = self.wallet.address() {
                self.signatures.invalidate_purpose(&address, self.purpose());
            }
        }
        e.into()
    }

    // =========================================================================
    // One-shot queries
    // =========================================================================

    /// Fetch the overview once and grade it like the live dashboard does.
    pub async fn overview(&self) -> AppResult<DashboardView> {
        let snapshot = self.snapshot_source().fetch(true).await?;
        let mut state = ReconcilerState::new(self.config.dashboard.clone());
        state.apply_rest(snapshot);
        Ok(state.view(Utc::now()))
    }

    pub async fn node_status(&self, reference_code: &str) -> AppResult<NodeDetailedStatus> {
        let credential = self.credential().await?;
        self.api
            .node_detailed_status(&credential, reference_code, true)
            .await
            .map_err(|e| self.api_error(e))
    }

    pub async fn node_history(
        &self,
        reference_code: &str,
        hours: u32,
    ) -> AppResult<PerformanceHistory> {
        let credential = self.credential().await?;
        self.api
            .node_performance_history(&credential, reference_code, hours)
            .await
            .map_err(|e| self.api_error(e))
    }

    /// Public catalog; no credential needed.
    pub async fn node_types(&self) -> AppResult<Vec<NodeCatalogItem>> {
        Ok(self.api.node_types().await?)
    }

    // =========================================================================
    // Live monitor
    // =========================================================================

    /// Run the live monitor until Ctrl+C or cancellation.
    pub async fn run(self) -> AppResult<()> {
        info!(wallet = ?self.wallet.address(), "Starting monitor");

        let (event_tx, event_rx) = mpsc::channel::<WsEvent>(EVENT_CHANNEL_CAPACITY);
        let connection = Arc::new(ConnectionManager::new(
            self.config.websocket.clone(),
            self.signatures.clone(),
            self.signer(),
            event_tx,
        ));

        let source: Arc<dyn SnapshotSource> = Arc::new(self.snapshot_source());
        let (reconciler, reconciler_handle) =
            spawn_reconciler(self.config.dashboard.clone(), source, self.cache.clone());

        let (forward_tx, mut forward_rx) = mpsc::channel::<WsEvent>(EVENT_CHANNEL_CAPACITY);
        let bridge = spawn_ws_bridge(
            event_rx,
            connection.clone(),
            reconciler.clone(),
            Some(forward_tx),
        );

        let sweeper = self
            .cache
            .spawn_sweeper(self.config.cache.sweep_interval(), self.cancel.child_token());
        let metrics_dump = self.config.telemetry.metrics_path.clone().map(|path| {
            info!(path = %path.display(), "Writing metrics export");
            aeronyx_telemetry::spawn_metrics_dump(
                path,
                Duration::from_secs(self.config.telemetry.metrics_interval_secs),
                self.cancel.child_token(),
            )
        });

        connection.connect();
        // Deferred until the socket has authenticated.
        connection.start_monitoring().await?;

        let mut views = reconciler.subscribe();
        let mut reporter = ViewReporter::new(Duration::from_secs(
            self.config.telemetry.summary_interval_secs,
        ));

        loop {
            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        error!("Reconciler stopped unexpectedly");
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    reporter.report(&view);
                }

                Some(event) = forward_rx.recv() => {
                    handle_event(&connection, event).await;
                }

                () = self.cancel.cancelled() => {
                    info!("Cancellation requested");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Shutting down");
        connection.disconnect(1000, "client shutdown").await;
        reconciler.shutdown().await;
        if let Err(e) = reconciler_handle.await {
            warn!(error = %e, "Reconciler task ended abnormally");
        }
        bridge.abort();

        self.cancel.cancel();
        let _ = sweeper.await;
        if let Some(handle) = metrics_dump {
            let _ = handle.await;
        }

        let final_view = reconciler.view();
        info!(
            total_nodes = final_view.stats.total_nodes,
            active_nodes = final_view.stats.active_nodes,
            quality = %final_view.data_quality,
            "Monitor stopped"
        );
        Ok(())
    }
}

/// Events the bridge does not consume.
async fn handle_event(connection: &ConnectionManager, event: WsEvent) {
    match event {
        WsEvent::Authenticated { wallet_address } => {
            info!(wallet = %wallet_address, "WebSocket authenticated");
        }
        WsEvent::MonitoringStarted => info!("Live monitoring started"),
        WsEvent::MonitoringStopped => {
            info!("Live monitoring stopped by server, requesting again");
            if let Err(e) = connection.start_monitoring().await {
                warn!(error = %e, "Failed to restart monitoring");
            }
        }
        WsEvent::ServerError { code, message } => {
            warn!(code = ?code, message = %message, "Server reported an error");
        }
        WsEvent::PassThrough {
            frame_type,
            payload,
        } => {
            debug!(frame_type = %frame_type, payload = %payload, "Ignoring pass-through frame");
        }
        WsEvent::StateChanged { .. } | WsEvent::Update(_) => {}
    }
}

/// Logs what changed in the dashboard view, plus a periodic summary.
struct ViewReporter {
    last: Option<(Option<DataSource>, DataQuality, ConnectionState, usize, usize)>,
    summary_every: Duration,
    last_summary: Option<Instant>,
}

impl ViewReporter {
    fn new(summary_every: Duration) -> Self {
        Self {
            last: None,
            summary_every,
            last_summary: None,
        }
    }

    fn report(&mut self, view: &DashboardView) {
        let key = (
            view.data_source,
            view.data_quality,
            view.connection_state,
            view.stats.total_nodes,
            view.stats.active_nodes,
        );
        let changed = self.last != Some(key);
        self.last = Some(key);

        let summary_due = self
            .last_summary
            .map_or(true, |at| at.elapsed() >= self.summary_every);

        if changed || summary_due {
            self.last_summary = Some(Instant::now());
            info!(
                source = ?view.data_source,
                quality = %view.data_quality,
                connection = %view.connection_state,
                latency_ms = ?view.latency_ms,
                total = view.stats.total_nodes,
                active = view.stats.active_nodes,
                offline = view.stats.offline_nodes,
                earnings = %view.stats.total_earnings,
                utilization = view.stats.resource_utilization,
                "Dashboard"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_tracks_changes() {
        let mut reporter = ViewReporter::new(Duration::from_secs(3600));
        let mut view = DashboardView::default();

        reporter.report(&view);
        let first = reporter.last_summary;
        assert!(first.is_some());

        // Same key, summary not due.
        reporter.report(&view);
        assert_eq!(reporter.last_summary, first);

        view.data_quality = DataQuality::Recent;
        view.data_source = Some(DataSource::Rest);
        reporter.report(&view);
        assert_eq!(
            reporter.last.map(|k| k.1),
            Some(DataQuality::Recent)
        );
    }
}
