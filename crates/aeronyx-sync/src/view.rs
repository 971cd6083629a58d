//! The merged dashboard view.

use crate::stats::DashboardStats;
use aeronyx_core::{DataQuality, DataSource, NodeRecord};
use aeronyx_ws::ConnectionState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the dashboard shows at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardView {
    pub stats: DashboardStats,
    /// Sorted by reference code.
    pub nodes: Vec<NodeRecord>,
    /// `None` until any source has delivered data.
    pub data_source: Option<DataSource>,
    pub data_quality: DataQuality,
    /// `as_of` of the snapshot shown.
    pub last_updated: Option<DateTime<Utc>>,
    pub connection_state: ConnectionState,
    pub latency_ms: Option<f64>,
}

impl DashboardView {
    pub fn node(&self, reference_code: &str) -> Option<&NodeRecord> {
        self.nodes
            .binary_search_by(|n| n.reference_code.as_str().cmp(reference_code))
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn is_realtime(&self) -> bool {
        self.data_quality == DataQuality::Realtime
    }
}
