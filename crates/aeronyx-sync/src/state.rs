//! Source slots and the authority policy.
//!
//! Each source owns one slot that is replaced wholesale. Which slot the
//! view shows, and how fresh it is graded, is decided at read time from the
//! slots' `as_of` and the connection state, so nothing here depends on the
//! order in which data arrived.

use crate::config::ReconcilerConfig;
use crate::stats::DashboardStats;
use crate::view::DashboardView;
use aeronyx_core::{DataQuality, DataSource, NodeRecord};
use aeronyx_ws::ConnectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A complete node list from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: DataSource,
    pub records: Vec<NodeRecord>,
    /// Server time when known, otherwise when the data was requested or
    /// received.
    pub as_of: DateTime<Utc>,
}

impl Snapshot {
    pub fn rest(records: Vec<NodeRecord>, as_of: DateTime<Utc>) -> Self {
        Self {
            source: DataSource::Rest,
            records,
            as_of,
        }
    }

    pub fn websocket(records: Vec<NodeRecord>, as_of: DateTime<Utc>) -> Self {
        Self {
            source: DataSource::Websocket,
            records,
            as_of,
        }
    }

    /// Clamped at zero when the server clock runs ahead.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.as_of)
            .max(chrono::Duration::zero())
    }
}

/// Outcome of the authority policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    pub source: Option<DataSource>,
    pub quality: DataQuality,
}

#[derive(Debug)]
pub struct ReconcilerState {
    config: ReconcilerConfig,
    rest: Option<Snapshot>,
    ws: Option<Snapshot>,
    connection_state: ConnectionState,
    latency_ms: Option<f64>,
}

impl ReconcilerState {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            rest: None,
            ws: None,
            connection_state: ConnectionState::default(),
            latency_ms: None,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Replace the REST slot. A snapshot older than the current one is
    /// dropped and `false` returned.
    pub fn apply_rest(&mut self, snapshot: Snapshot) -> bool {
        if let Some(current) = &self.rest {
            if snapshot.as_of < current.as_of {
                debug!(
                    incoming = %snapshot.as_of,
                    current = %current.as_of,
                    "Dropping out-of-order REST snapshot"
                );
                return false;
            }
        }
        self.rest = Some(Snapshot {
            source: DataSource::Rest,
            ..snapshot
        });
        true
    }

    /// Replace the WebSocket slot with records received at `now`.
    pub fn apply_ws(&mut self, records: Vec<NodeRecord>, now: DateTime<Utc>) {
        self.ws = Some(Snapshot::websocket(records, now));
    }

    pub fn set_connection(&mut self, state: ConnectionState, latency_ms: Option<f64>) {
        self.connection_state = state;
        self.latency_ms = latency_ms;
    }

    pub fn monitoring_active(&self) -> bool {
        self.connection_state == ConnectionState::Monitoring
    }

    pub fn rest_snapshot(&self) -> Option<&Snapshot> {
        self.rest.as_ref()
    }

    pub fn ws_snapshot(&self) -> Option<&Snapshot> {
        self.ws.as_ref()
    }

    /// Drop both slots, e.g. after the wallet changed.
    pub fn clear(&mut self) {
        self.rest = None;
        self.ws = None;
    }

    pub fn authority(&self, now: DateTime<Utc>) -> Authority {
        self.resolve(now).0
    }

    /// Stale and offline views ask for a background REST refresh.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.authority(now).quality,
            DataQuality::Stale | DataQuality::Offline
        )
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let (authority, slot) = self.resolve(now);
        let nodes = slot.map(|s| s.records.clone()).unwrap_or_default();
        DashboardView {
            stats: DashboardStats::from_records(&nodes),
            nodes,
            data_source: authority.source,
            data_quality: authority.quality,
            last_updated: slot.map(|s| s.as_of),
            connection_state: self.connection_state,
            latency_ms: self.latency_ms,
        }
    }

    fn resolve(&self, now: DateTime<Utc>) -> (Authority, Option<&Snapshot>) {
        if self.monitoring_active() {
            if let Some(ws) = &self.ws {
                if ws.age_at(now) < self.config.ws_freshness() {
                    let authority = Authority {
                        source: Some(DataSource::Websocket),
                        quality: DataQuality::Realtime,
                    };
                    return (authority, Some(ws));
                }
            }
        }

        // Newest slot wins; on a tie the pushed data is preferred.
        let newest = match (&self.rest, &self.ws) {
            (Some(rest), Some(ws)) if rest.as_of > ws.as_of => Some(rest),
            (_, Some(ws)) => Some(ws),
            (Some(rest), None) => Some(rest),
            (None, None) => None,
        };

        let Some(slot) = newest else {
            let authority = Authority {
                source: None,
                quality: DataQuality::Offline,
            };
            return (authority, None);
        };

        let age = slot.age_at(now);
        let quality = if age < self.config.stale_threshold() {
            DataQuality::Recent
        } else if age >= self.config.offline_threshold() {
            DataQuality::Offline
        } else {
            DataQuality::Stale
        };
        let authority = Authority {
            source: Some(slot.source),
            quality,
        };
        (authority, Some(slot))
    }
}
