//! Normalized node records.
//!
//! REST and WebSocket deliver nodes in different shapes. Both are converted
//! into `NodeRecord` before anything else looks at them.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Node lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Registered but never connected.
    #[default]
    Pending,
    /// Online and reporting.
    #[serde(alias = "online")]
    Active,
    Offline,
    Suspended,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Offline => "offline",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "registered" => Ok(Self::Pending),
            "active" | "online" | "running" => Ok(Self::Active),
            "offline" | "inactive" | "disconnected" => Ok(Self::Offline),
            "suspended" | "disabled" => Ok(Self::Suspended),
            other => Err(CoreError::InvalidNodeStatus(other.to_string())),
        }
    }
}

/// Resource usage percentages, each clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodePerformance {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network: f64,
}

impl NodePerformance {
    pub fn new(cpu: f64, memory: f64, disk: f64, network: f64) -> Self {
        Self {
            cpu: clamp_percent(cpu),
            memory: clamp_percent(memory),
            disk: clamp_percent(disk),
            network: clamp_percent(network),
        }
    }

    /// Mean of CPU and memory, the per-node utilization figure.
    pub fn utilization(&self) -> f64 {
        (self.cpu + self.memory) / 2.0
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

/// Live connection information for a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeConnection {
    pub connected: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A node as seen by the dashboard, whichever source it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique key.
    pub reference_code: String,
    pub name: String,
    pub status: NodeStatus,
    pub performance: NodePerformance,
    pub earnings: Decimal,
    pub connection: NodeConnection,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NodeRecord {
    pub fn new(reference_code: impl Into<String>, name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            reference_code: reference_code.into(),
            name: name.into(),
            status,
            performance: NodePerformance::default(),
            earnings: Decimal::ZERO,
            connection: NodeConnection::default(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

/// Which source is authoritative for the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Rest,
    Websocket,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rest => write!(f, "rest"),
            Self::Websocket => write!(f, "websocket"),
        }
    }
}

/// Freshness grade of the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Live monitoring subscription is delivering updates.
    Realtime,
    /// Snapshot within the stale threshold.
    Recent,
    /// Data exists but is older than the stale threshold.
    Stale,
    /// No data, or data too old to show as current.
    #[default]
    Offline,
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Realtime => "realtime",
            Self::Recent => "recent",
            Self::Stale => "stale",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}
