//! Wire types of the AeroNyx REST API.
//!
//! Numeric fields are defaulted because the backend omits them for nodes
//! that have never reported. Earnings arrive as strings or numbers and are
//! parsed into `Decimal` either way.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// `POST /user/nodes-overview/` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodesOverview {
    #[serde(default)]
    pub summary: OverviewSummary,
    #[serde(default)]
    pub nodes: NodeBuckets,
    /// Server generation time, RFC 3339.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl NodesOverview {
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.online.len() + self.nodes.active.len() + self.nodes.offline.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewSummary {
    #[serde(default)]
    pub total_nodes: u32,
    #[serde(default)]
    pub online_nodes: u32,
    #[serde(default)]
    pub active_nodes: u32,
    #[serde(default)]
    pub offline_nodes: u32,
    #[serde(default)]
    pub total_earnings: Option<Decimal>,
}

/// Nodes grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeBuckets {
    #[serde(default)]
    pub online: Vec<RestNode>,
    #[serde(default)]
    pub active: Vec<RestNode>,
    #[serde(default)]
    pub offline: Vec<RestNode>,
}

/// A node as the REST API reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestNode {
    /// Blank when the backend omits it; such nodes are dropped on normalization.
    #[serde(default)]
    pub reference_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub performance: RestPerformance,
    #[serde(default)]
    pub total_earnings: Option<Decimal>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RestPerformance {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub memory_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub storage_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bandwidth_usage: f64,
}

/// A `null` number reads as its default, like a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `POST /user/node-detailed-status/` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetailedStatus {
    #[serde(alias = "node_info")]
    pub node: RestNode,
    #[serde(default)]
    pub uptime_seconds: Option<u64>,
    #[serde(default)]
    pub remote_management_enabled: Option<bool>,
}

/// `POST /user/node-performance-history/` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    #[serde(default)]
    pub reference_code: Option<String>,
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default, alias = "data_points")]
    pub history: Vec<PerformanceSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub memory_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub storage_usage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bandwidth_usage: f64,
}

/// `POST /nodes/generate-registration-code/` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCode {
    pub registration_code: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Entry of `GET /node-types/` and `GET /node-resources/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCatalogItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Node creation input. Credential fields are added by `AeronyxApi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    pub blockchain_network_id: i64,
    pub node_type_id: i64,
    #[serde(default)]
    pub resources: Vec<i64>,
}

/// Parse an RFC 3339 timestamp, tolerating a missing zone (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
