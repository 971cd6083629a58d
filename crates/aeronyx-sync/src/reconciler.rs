//! Reconciler actor.
//!
//! One task owns the source slots. WebSocket updates, connection changes and
//! refresh requests arrive as messages; REST fetches run in spawned tasks and
//! report back, so a slow request never delays a push update. Views are
//! published on a `watch` channel whenever they change.

use crate::config::ReconcilerConfig;
use crate::error::{SyncError, SyncResult};
use crate::normalize::from_ws_nodes;
use crate::source::SnapshotSource;
use crate::state::{ReconcilerState, Snapshot};
use crate::view::DashboardView;
use aeronyx_cache::CacheStore;
use aeronyx_core::DataQuality;
use aeronyx_telemetry::Metrics;
use aeronyx_ws::{ConnectionState, RealTimeUpdate};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Cache namespace of the last REST snapshot per wallet.
pub const DASHBOARD_NAMESPACE: &str = "dashboard";

const CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// ReconcilerMsg
// ============================================================================

#[derive(Debug)]
pub enum ReconcilerMsg {
    /// A `real_time_update` frame. Coalesced within the debounce window.
    WsUpdate(RealTimeUpdate),

    Connection {
        state: ConnectionState,
        latency_ms: Option<f64>,
    },

    /// Fetch a REST snapshot now, outside the background rate limit.
    Refresh {
        force: bool,
        reply: oneshot::Sender<SyncResult<DashboardView>>,
    },

    /// Forget both slots and reload for the current wallet.
    Reset,

    Shutdown,
}

// ============================================================================
// ReconcilerTask
// ============================================================================

pub struct ReconcilerTask {
    rx: mpsc::Receiver<ReconcilerMsg>,
    state: ReconcilerState,
    source: Arc<dyn SnapshotSource>,
    cache: Arc<CacheStore>,
    view_tx: watch::Sender<DashboardView>,

    fetch_tx: mpsc::Sender<(u64, SyncResult<Snapshot>)>,
    fetch_rx: mpsc::Receiver<(u64, SyncResult<Snapshot>)>,
    fetch_in_flight: bool,
    /// Bumped on reset. Fetches started under an older generation are discarded.
    generation: u64,
    last_fetch: Option<Instant>,
    /// Answered by the fetch in flight.
    waiters: Vec<oneshot::Sender<SyncResult<DashboardView>>>,
    /// Arrived while a fetch was in flight; answered by the next one.
    queued: Vec<oneshot::Sender<SyncResult<DashboardView>>>,
    queued_force: bool,
    /// A reset arrived while a fetch was in flight.
    refetch_after_reset: bool,

    pending_update: Option<RealTimeUpdate>,
    flush_at: Instant,
}

impl ReconcilerTask {
    pub async fn run(mut self) {
        debug!("Reconciler started");
        self.restore_cached();
        self.publish();
        self.start_fetch(false, "startup");

        let period = self.state.config().evaluate_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    None | Some(ReconcilerMsg::Shutdown) => break,
                    Some(msg) => self.handle_message(msg),
                },

                Some((generation, result)) = self.fetch_rx.recv() => {
                    self.on_fetch(generation, result);
                }

                () = tokio::time::sleep_until(self.flush_at), if self.pending_update.is_some() => {
                    self.flush_update();
                }

                _ = ticker.tick() => {
                    self.publish();
                    self.maybe_refresh();
                }
            }
        }

        for waiter in self.waiters.drain(..).chain(self.queued.drain(..)) {
            let _ = waiter.send(Err(SyncError::Stopped));
        }
        debug!("Reconciler terminated");
    }

    fn handle_message(&mut self, msg: ReconcilerMsg) {
        match msg {
            ReconcilerMsg::WsUpdate(update) => {
                if self.pending_update.is_none() {
                    self.flush_at = Instant::now() + self.state.config().debounce();
                } else {
                    trace!(sequence = ?update.sequence, "Coalescing update");
                }
                self.pending_update = Some(update);
            }
            ReconcilerMsg::Connection { state, latency_ms } => {
                self.state.set_connection(state, latency_ms);
                self.publish();
                self.maybe_refresh();
            }
            ReconcilerMsg::Refresh { force, reply } => {
                if self.fetch_in_flight {
                    self.queued.push(reply);
                    self.queued_force |= force;
                } else {
                    self.waiters.push(reply);
                    self.start_fetch(force, "manual");
                }
            }
            ReconcilerMsg::Reset => {
                info!("Resetting dashboard data");
                self.state.clear();
                self.pending_update = None;
                self.last_fetch = None;
                self.generation = self.generation.wrapping_add(1);
                self.restore_cached();
                self.publish();
                if self.fetch_in_flight {
                    debug!("Reset during fetch, reloading once it lands");
                    self.refetch_after_reset = true;
                } else {
                    self.start_fetch(true, "reset");
                }
            }
            ReconcilerMsg::Shutdown => {}
        }
    }

    fn flush_update(&mut self) {
        let Some(update) = self.pending_update.take() else {
            return;
        };
        let records = from_ws_nodes(&update.data.nodes);
        trace!(nodes = records.len(), sequence = ?update.sequence, "Applying pushed snapshot");
        self.state.apply_ws(records, Utc::now());
        self.publish();
    }

    fn on_fetch(&mut self, generation: u64, result: SyncResult<Snapshot>) {
        self.fetch_in_flight = false;

        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Discarding snapshot fetched before reset"
            );
            // Earlier waiters are answered by the reload.
            let mut waiters = std::mem::take(&mut self.waiters);
            waiters.append(&mut self.queued);
            self.waiters = waiters;
            self.queued_force = false;
            self.refetch_after_reset = false;
            self.start_fetch(true, "reset");
            return;
        }

        let outcome = match result {
            Ok(snapshot) => {
                if self.state.apply_rest(snapshot.clone()) {
                    self.persist(&snapshot);
                }
                self.publish();
                Ok(self.view_tx.borrow().clone())
            }
            Err(e) => {
                warn!(error = %e, "Snapshot refresh failed");
                self.publish();
                Err(e)
            }
        };

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }

        if std::mem::take(&mut self.refetch_after_reset) {
            self.waiters = std::mem::take(&mut self.queued);
            self.queued_force = false;
            self.start_fetch(true, "reset");
        } else if !self.queued.is_empty() {
            self.waiters = std::mem::take(&mut self.queued);
            let force = std::mem::take(&mut self.queued_force);
            self.start_fetch(force, "manual");
        }
    }

    /// Background refresh for stale or offline views, at most once per
    /// `min_rest_interval`.
    fn maybe_refresh(&mut self) {
        if self.fetch_in_flight || !self.state.needs_refresh(Utc::now()) {
            return;
        }
        let interval = self.state.config().min_rest_interval();
        if let Some(last) = self.last_fetch {
            if last.elapsed() < interval {
                trace!("Background refresh rate-limited");
                return;
            }
        }
        self.start_fetch(false, "stale");
    }

    fn start_fetch(&mut self, force: bool, trigger: &'static str) {
        if self.fetch_in_flight {
            debug!(trigger, "Refresh already in flight");
            return;
        }
        self.fetch_in_flight = true;
        self.last_fetch = Some(Instant::now());
        Metrics::snapshot_refresh(trigger);
        debug!(trigger, force, "Refreshing REST snapshot");

        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = source.fetch(force).await;
            if tx.send((generation, result)).await.is_err() {
                debug!("Reconciler gone before the snapshot arrived");
            }
        });
    }

    fn publish(&mut self) {
        let view = self.state.view(Utc::now());
        Metrics::node_counts(
            view.stats.active_nodes,
            view.stats.offline_nodes,
            view.stats.pending_nodes,
            view.stats.suspended_nodes,
        );
        Metrics::data_quality_set(&view.data_quality.to_string());

        let previous_quality = self.view_tx.borrow().data_quality;
        if previous_quality != view.data_quality {
            log_quality_change(previous_quality, view.data_quality);
        }
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn cache_key(&self) -> Option<String> {
        self.source
            .wallet_address()
            .map(|address| address.to_ascii_lowercase())
    }

    fn persist(&self, snapshot: &Snapshot) {
        let Some(key) = self.cache_key() else {
            return;
        };
        let ttl = self.state.config().snapshot_ttl();
        if let Err(e) = self.cache.set_as(DASHBOARD_NAMESPACE, &key, snapshot, Some(ttl)) {
            warn!(error = %e, "Failed to cache snapshot");
        }
    }

    fn restore_cached(&mut self) {
        let Some(key) = self.cache_key() else {
            return;
        };
        if let Some(snapshot) = self.cache.get_as::<Snapshot>(DASHBOARD_NAMESPACE, &key) {
            info!(
                nodes = snapshot.records.len(),
                as_of = %snapshot.as_of,
                "Restored cached snapshot"
            );
            self.state.apply_rest(snapshot);
        }
    }
}

fn log_quality_change(from: DataQuality, to: DataQuality) {
    match to {
        DataQuality::Stale | DataQuality::Offline => {
            warn!(%from, %to, "Dashboard data quality degraded");
        }
        _ => info!(%from, %to, "Dashboard data quality changed"),
    }
}

// ============================================================================
// ReconcilerHandle
// ============================================================================

#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::Sender<ReconcilerMsg>,
    view_rx: watch::Receiver<DashboardView>,
}

impl ReconcilerHandle {
    /// Latest published view.
    pub fn view(&self) -> DashboardView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_rx.clone()
    }

    pub async fn push_update(&self, update: RealTimeUpdate) {
        let _ = self.tx.send(ReconcilerMsg::WsUpdate(update)).await;
    }

    pub async fn connection_changed(&self, state: ConnectionState, latency_ms: Option<f64>) {
        let _ = self
            .tx
            .send(ReconcilerMsg::Connection { state, latency_ms })
            .await;
    }

    /// Fetch a snapshot now and return the resulting view. `force` bypasses
    /// the response cache.
    pub async fn refresh(&self, force: bool) -> SyncResult<DashboardView> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ReconcilerMsg::Refresh { force, reply })
            .await
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)?
    }

    pub async fn reset(&self) {
        let _ = self.tx.send(ReconcilerMsg::Reset).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ReconcilerMsg::Shutdown).await;
    }
}

/// Spawn the reconciler actor.
#[must_use]
pub fn spawn_reconciler(
    config: ReconcilerConfig,
    source: Arc<dyn SnapshotSource>,
    cache: Arc<CacheStore>,
) -> (ReconcilerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (fetch_tx, fetch_rx) = mpsc::channel(4);
    let (view_tx, view_rx) = watch::channel(DashboardView::default());

    let task = ReconcilerTask {
        rx,
        state: ReconcilerState::new(config),
        source,
        cache,
        view_tx,
        fetch_tx,
        fetch_rx,
        fetch_in_flight: false,
        generation: 0,
        last_fetch: None,
        waiters: Vec::new(),
        queued: Vec::new(),
        queued_force: false,
        refetch_after_reset: false,
        pending_update: None,
        flush_at: Instant::now(),
    };

    let handle = ReconcilerHandle { tx, view_rx };
    let join_handle = tokio::spawn(task.run());
    (handle, join_handle)
}
