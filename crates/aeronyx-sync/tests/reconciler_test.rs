//! Reconciler actor behavior with a scripted snapshot source.

use aeronyx_auth::BoxFuture;
use aeronyx_cache::CacheStore;
use aeronyx_core::{DataQuality, DataSource, ErrorKind, NodeRecord, NodeStatus};
use aeronyx_rest::ApiError;
use aeronyx_sync::{
    spawn_reconciler, DashboardView, ReconcilerConfig, Snapshot, SnapshotSource, SyncError,
    SyncResult, DASHBOARD_NAMESPACE,
};
use aeronyx_ws::{ConnectionState, RealTimeUpdate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const WALLET: &str = "0xAbC0000000000000000000000000000000000001";
const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Scripted source
// ============================================================================

struct ScriptedSource {
    responses: Mutex<VecDeque<SyncResult<Snapshot>>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    fn new(responses: Vec<SyncResult<Snapshot>>) -> Arc<Self> {
        Self::with_delay(responses, Duration::ZERO)
    }

    fn with_delay(responses: Vec<SyncResult<Snapshot>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            fetches: AtomicUsize::new(0),
            delay,
        })
    }

    fn push(&self, response: SyncResult<Snapshot>) {
        self.responses.lock().push_back(response);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedSource {
    fn fetch(&self, _force_refresh: bool) -> BoxFuture<'_, SyncResult<Snapshot>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(server_error()))
        })
    }

    fn wallet_address(&self) -> Option<String> {
        Some(WALLET.to_string())
    }
}

fn server_error() -> SyncError {
    SyncError::Api(ApiError::new(ErrorKind::Server, "unavailable"))
}

fn record(code: &str, status: NodeStatus) -> NodeRecord {
    NodeRecord::new(code, code, status)
}

fn rest_snapshot(records: Vec<NodeRecord>, as_of: DateTime<Utc>) -> SyncResult<Snapshot> {
    Ok(Snapshot::rest(records, as_of))
}

fn update(nodes: serde_json::Value) -> RealTimeUpdate {
    serde_json::from_value(json!({"data": {"nodes": nodes}})).unwrap()
}

async fn wait_view<F>(rx: &mut watch::Receiver<DashboardView>, pred: F) -> DashboardView
where
    F: FnMut(&DashboardView) -> bool,
{
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("view within timeout")
        .expect("reconciler alive")
        .clone()
}

// ============================================================================
// REST snapshots
// ============================================================================

#[tokio::test]
async fn test_startup_fetch_publishes_rest_view() {
    let source = ScriptedSource::new(vec![rest_snapshot(
        vec![
            record("AERO-1", NodeStatus::Active),
            record("AERO-2", NodeStatus::Offline),
            record("AERO-3", NodeStatus::Offline),
        ],
        Utc::now(),
    )]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source.clone(),
        Arc::new(CacheStore::default()),
    );

    let mut rx = handle.subscribe();
    let view = wait_view(&mut rx, |v| v.data_source.is_some()).await;
    assert_eq!(view.data_source, Some(DataSource::Rest));
    assert_eq!(view.data_quality, DataQuality::Recent);
    assert_eq!(view.stats.total_nodes, 3);
    assert_eq!(view.stats.active_nodes, 1);
    assert_eq!(view.stats.offline_nodes, 2);
    assert_eq!(view.stats.pending_nodes, 0);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_refresh_returns_view_or_error() {
    let source = ScriptedSource::new(vec![Err(server_error())]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source.clone(),
        Arc::new(CacheStore::default()),
    );

    source.push(rest_snapshot(vec![record("AERO-1", NodeStatus::Active)], Utc::now()));
    let view = handle.refresh(true).await.unwrap();
    assert_eq!(view.stats.active_nodes, 1);
    assert_eq!(handle.view(), view);

    let err = handle.refresh(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    // The last good data is still shown.
    assert_eq!(handle.view().stats.active_nodes, 1);
}

#[tokio::test]
async fn test_older_response_does_not_replace_newer() {
    let now = Utc::now();
    let source = ScriptedSource::new(vec![rest_snapshot(
        vec![record("AERO-1", NodeStatus::Active), record("AERO-2", NodeStatus::Active)],
        now,
    )]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source.clone(),
        Arc::new(CacheStore::default()),
    );
    let mut rx = handle.subscribe();
    wait_view(&mut rx, |v| v.stats.total_nodes == 2).await;

    source.push(rest_snapshot(
        vec![record("AERO-1", NodeStatus::Offline)],
        now - chrono::Duration::seconds(30),
    ));
    let view = handle.refresh(false).await.unwrap();
    assert_eq!(view.stats.total_nodes, 2);
    assert_eq!(view.last_updated, Some(now));
}

#[tokio::test]
async fn test_cached_snapshot_restored_and_refreshed() {
    let cache = Arc::new(CacheStore::default());
    let cached = Snapshot::rest(vec![record("AERO-7", NodeStatus::Pending)], Utc::now());
    cache
        .set_as(DASHBOARD_NAMESPACE, &WALLET.to_ascii_lowercase(), &cached, None)
        .unwrap();

    // The live fetch is slow; the cached copy is shown meanwhile.
    let source = ScriptedSource::with_delay(
        vec![rest_snapshot(vec![record("AERO-8", NodeStatus::Active)], Utc::now())],
        Duration::from_millis(300),
    );
    let (handle, _task) = spawn_reconciler(ReconcilerConfig::default(), source, cache.clone());

    let mut rx = handle.subscribe();
    let view = wait_view(&mut rx, |v| v.data_source.is_some()).await;
    assert_eq!(view.nodes[0].reference_code, "AERO-7");

    let view = wait_view(&mut rx, |v| v.node("AERO-8").is_some()).await;
    assert_eq!(view.stats.active_nodes, 1);
    let persisted: Snapshot = cache
        .get_as(DASHBOARD_NAMESPACE, &WALLET.to_ascii_lowercase())
        .unwrap();
    assert_eq!(persisted.records[0].reference_code, "AERO-8");
}

#[tokio::test]
async fn test_reset_reloads() {
    let source = ScriptedSource::new(vec![rest_snapshot(
        vec![record("AERO-1", NodeStatus::Active)],
        Utc::now(),
    )]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source.clone(),
        Arc::new(CacheStore::default()),
    );
    let mut rx = handle.subscribe();
    wait_view(&mut rx, |v| v.stats.total_nodes == 1).await;

    source.push(rest_snapshot(
        vec![record("AERO-5", NodeStatus::Suspended), record("AERO-6", NodeStatus::Suspended)],
        Utc::now(),
    ));
    handle.reset().await;
    let view = wait_view(&mut rx, |v| v.stats.suspended_nodes == 2).await;
    assert!(view.node("AERO-1").is_none());
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_fetch_in_flight() {
    let cache = Arc::new(CacheStore::default());
    let source = ScriptedSource::with_delay(
        vec![rest_snapshot(vec![record("AERO-OLD", NodeStatus::Active)], Utc::now())],
        Duration::from_millis(300),
    );
    source.push(rest_snapshot(vec![record("AERO-NEW", NodeStatus::Active)], Utc::now()));
    let (handle, _task) =
        spawn_reconciler(ReconcilerConfig::default(), source.clone(), cache.clone());
    let mut rx = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let pending = tokio::spawn({
        let handle = handle.clone();
        async move { handle.refresh(false).await }
    });
    tokio::time::sleep(Duration::from_millis(40)).await;
    handle.reset().await;

    let view = wait_view(&mut rx, |v| v.node("AERO-NEW").is_some()).await;
    assert!(view.node("AERO-OLD").is_none());

    // The refresh issued before the reset is answered by the reload.
    let answered = pending.await.unwrap().unwrap();
    assert!(answered.node("AERO-NEW").is_some());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.view().node("AERO-OLD").is_none());
    assert_eq!(source.fetches(), 2);
    let persisted: Snapshot = cache
        .get_as(DASHBOARD_NAMESPACE, &WALLET.to_ascii_lowercase())
        .unwrap();
    assert_eq!(persisted.records[0].reference_code, "AERO-NEW");
}

#[tokio::test]
async fn test_snapshot_cached_with_configured_ttl() {
    let cache = Arc::new(CacheStore::default());
    let source = ScriptedSource::new(vec![rest_snapshot(
        vec![record("AERO-1", NodeStatus::Active)],
        Utc::now(),
    )]);
    let config = ReconcilerConfig {
        snapshot_ttl_ms: 3_600_000,
        ..ReconcilerConfig::default()
    };
    let (handle, _task) = spawn_reconciler(config, source, cache.clone());
    let mut rx = handle.subscribe();
    wait_view(&mut rx, |v| v.stats.total_nodes == 1).await;

    // Outlives the 300 s namespace default.
    let remaining = cache
        .ttl_remaining(DASHBOARD_NAMESPACE, &WALLET.to_ascii_lowercase())
        .unwrap();
    assert!(remaining > Duration::from_secs(3_500));
    assert!(remaining <= Duration::from_secs(3_600));
}

// ============================================================================
// WebSocket updates
// ============================================================================

#[tokio::test]
async fn test_ws_update_takes_over_while_monitoring() {
    let source = ScriptedSource::new(vec![rest_snapshot(
        vec![record("AERO-1", NodeStatus::Offline)],
        Utc::now() - chrono::Duration::seconds(20),
    )]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source,
        Arc::new(CacheStore::default()),
    );
    let mut rx = handle.subscribe();
    wait_view(&mut rx, |v| v.data_source == Some(DataSource::Rest)).await;

    handle
        .connection_changed(ConnectionState::Monitoring, Some(12.5))
        .await;
    handle
        .push_update(update(json!([
            {"reference_code": "AERO-1", "status": "active",
             "performance": {"cpu": 40, "memory": 60, "network": 30},
             "connection": {"connected": true}}
        ])))
        .await;

    let view = wait_view(&mut rx, |v| v.data_source == Some(DataSource::Websocket)).await;
    assert_eq!(view.data_quality, DataQuality::Realtime);
    assert_eq!(view.connection_state, ConnectionState::Monitoring);
    assert_eq!(view.latency_ms, Some(12.5));
    assert_eq!(view.stats.active_nodes, 1);
    assert_eq!(view.stats.resource_utilization, 50);
    assert_eq!(view.stats.network_contribution, 30);

    // Monitoring ends: the pushed data is still the newest, but no longer live.
    handle
        .connection_changed(ConnectionState::Authenticated, None)
        .await;
    let view = wait_view(&mut rx, |v| v.data_quality != DataQuality::Realtime).await;
    assert_eq!(view.data_source, Some(DataSource::Websocket));
    assert_eq!(view.data_quality, DataQuality::Recent);
}

#[tokio::test(start_paused = true)]
async fn test_updates_coalesced_within_debounce() {
    let source = ScriptedSource::new(vec![rest_snapshot(vec![], Utc::now())]);
    let (handle, _task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source,
        Arc::new(CacheStore::default()),
    );
    let mut rx = handle.subscribe();
    handle
        .connection_changed(ConnectionState::Monitoring, None)
        .await;
    wait_view(&mut rx, |v| {
        v.connection_state == ConnectionState::Monitoring && v.data_source.is_some()
    })
    .await;
    rx.borrow_and_update();

    for i in 1..=5 {
        let code = format!("AERO-{i}");
        handle
            .push_update(update(json!([{"reference_code": code, "connection": {"connected": true}}])))
            .await;
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!rx.has_changed().unwrap(), "published inside the window");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.has_changed().unwrap());
    let view = rx.borrow_and_update().clone();
    let codes: Vec<&str> = view.nodes.iter().map(|n| n.reference_code.as_str()).collect();
    assert_eq!(codes, vec!["AERO-5"]);
    assert_eq!(view.data_source, Some(DataSource::Websocket));
}

// ============================================================================
// Background refresh
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_background_refresh_rate_limited() {
    // Every fetch fails, so the view stays offline and keeps asking.
    let source = ScriptedSource::new(vec![]);
    let config = ReconcilerConfig {
        evaluate_interval_ms: 1_000,
        min_rest_interval_ms: 30_000,
        ..ReconcilerConfig::default()
    };
    let (handle, _task) = spawn_reconciler(config, source.clone(), Arc::new(CacheStore::default()));

    for _ in 0..20 {
        handle
            .connection_changed(ConnectionState::Reconnecting, None)
            .await;
    }
    tokio::time::sleep(Duration::from_millis(29_500)).await;
    assert_eq!(source.fetches(), 1);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(source.fetches(), 3);
    assert_eq!(handle.view().data_quality, DataQuality::Offline);
}

#[tokio::test]
async fn test_fresh_view_does_not_refresh() {
    let source = ScriptedSource::new(vec![rest_snapshot(vec![], Utc::now())]);
    let config = ReconcilerConfig {
        evaluate_interval_ms: 20,
        min_rest_interval_ms: 0,
        ..ReconcilerConfig::default()
    };
    let (handle, _task) = spawn_reconciler(config, source.clone(), Arc::new(CacheStore::default()));
    let mut rx = handle.subscribe();
    wait_view(&mut rx, |v| v.data_quality == DataQuality::Recent).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(source.fetches(), 1);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_refresh_after_shutdown_fails() {
    let source = ScriptedSource::new(vec![]);
    let (handle, task) = spawn_reconciler(
        ReconcilerConfig::default(),
        source,
        Arc::new(CacheStore::default()),
    );
    handle.shutdown().await;
    task.await.unwrap();

    let err = handle.refresh(false).await.unwrap_err();
    assert!(matches!(err, SyncError::Stopped));
}
