//! Shared fixtures: a protocol-speaking mock server and a wired manager.

pub mod mock_ws;

use aeronyx_auth::{MockChallengeProvider, MockWallet, SignatureManager, SignatureManagerConfig};
use aeronyx_cache::CacheStore;
use aeronyx_core::WalletType;
use aeronyx_ws::{BackoffPolicy, ConnectionConfig, ConnectionManager, ConnectionState, WsEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const WALLET: &str = "0xabc0000000000000000000000000000000000001";

pub struct Harness {
    pub manager: Arc<ConnectionManager>,
    pub events: mpsc::Receiver<WsEvent>,
    pub wallet: Arc<MockWallet>,
    pub signatures: SignatureManager,
}

/// Short timings so lifecycle tests finish quickly.
pub fn fast_config(url: String) -> ConnectionConfig {
    ConnectionConfig {
        url,
        auth_timeout_ms: 2_000,
        auth_grace_ms: 100,
        request_timeout_ms: 1_000,
        backoff: BackoffPolicy {
            base_delay_ms: 20,
            multiplier: 2.0,
            max_delay_ms: 80,
            max_attempts: 5,
        },
        ..ConnectionConfig::default()
    }
}

pub fn harness(config: ConnectionConfig) -> Harness {
    let wallet = Arc::new(MockWallet::new(WALLET, WalletType::Metamask));
    let signatures = SignatureManager::new(
        SignatureManagerConfig::default(),
        Arc::new(MockChallengeProvider::new()),
        Arc::new(CacheStore::default()),
        None,
    );
    let (event_tx, events) = mpsc::channel(256);
    let manager = Arc::new(ConnectionManager::new(
        config,
        signatures.clone(),
        wallet.clone(),
        event_tx,
    ));
    Harness {
        manager,
        events,
        wallet,
        signatures,
    }
}

pub async fn wait_for_state(
    manager: &ConnectionManager,
    target: ConnectionState,
    within: Duration,
) -> bool {
    let mut rx = manager.state_watch();
    tokio::time::timeout(within, rx.wait_for(|s| *s == target))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

pub async fn wait_until<F: Fn() -> bool>(cond: F, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collect state transitions in order until `target` is entered.
pub async fn states_until(
    events: &mut mpsc::Receiver<WsEvent>,
    target: ConnectionState,
    within: Duration,
) -> Vec<ConnectionState> {
    let mut states = Vec::new();
    let _ = tokio::time::timeout(within, async {
        while let Some(event) = events.recv().await {
            if let WsEvent::StateChanged { to, .. } = event {
                states.push(to);
                if to == target {
                    return;
                }
            }
        }
    })
    .await;
    states
}

/// Next event matching `pick`, skipping the rest.
pub async fn next_event<T, F>(
    events: &mut mpsc::Receiver<WsEvent>,
    within: Duration,
    pick: F,
) -> Option<T>
where
    F: Fn(WsEvent) -> Option<T>,
{
    tokio::time::timeout(within, async {
        while let Some(event) = events.recv().await {
            if let Some(found) = pick(event) {
                return Some(found);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
