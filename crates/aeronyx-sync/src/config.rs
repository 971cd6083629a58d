//! Reconciler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// WebSocket data younger than this is realtime while monitoring.
    #[serde(default = "default_ws_freshness_ms")]
    pub ws_freshness_ms: u64,
    /// Snapshots older than this are stale.
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,
    /// Snapshots older than this are shown as offline.
    #[serde(default = "default_offline_threshold_ms")]
    pub offline_threshold_ms: u64,
    /// Lower bound between two background REST refreshes.
    #[serde(default = "default_min_rest_interval_ms")]
    pub min_rest_interval_ms: u64,
    /// WebSocket updates closer than this are coalesced.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How often freshness is re-graded without new data.
    #[serde(default = "default_evaluate_interval_ms")]
    pub evaluate_interval_ms: u64,
    /// Lifetime of the last REST snapshot in the `dashboard` cache namespace.
    #[serde(default = "default_snapshot_ttl_ms")]
    pub snapshot_ttl_ms: u64,
    /// Credential purpose used for REST snapshots.
    #[serde(default = "default_auth_purpose")]
    pub auth_purpose: String,
}

fn default_ws_freshness_ms() -> u64 {
    30_000
}

fn default_stale_threshold_ms() -> u64 {
    5 * 60_000
}

fn default_offline_threshold_ms() -> u64 {
    15 * 60_000
}

fn default_min_rest_interval_ms() -> u64 {
    30_000
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_evaluate_interval_ms() -> u64 {
    5_000
}

fn default_snapshot_ttl_ms() -> u64 {
    24 * 60 * 60_000
}

fn default_auth_purpose() -> String {
    "api".to_string()
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            ws_freshness_ms: default_ws_freshness_ms(),
            stale_threshold_ms: default_stale_threshold_ms(),
            offline_threshold_ms: default_offline_threshold_ms(),
            min_rest_interval_ms: default_min_rest_interval_ms(),
            debounce_ms: default_debounce_ms(),
            evaluate_interval_ms: default_evaluate_interval_ms(),
            snapshot_ttl_ms: default_snapshot_ttl_ms(),
            auth_purpose: default_auth_purpose(),
        }
    }
}

impl ReconcilerConfig {
    pub fn ws_freshness(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.ws_freshness_ms as i64)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.stale_threshold_ms as i64)
    }

    pub fn offline_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.offline_threshold_ms as i64)
    }

    pub fn min_rest_interval(&self) -> Duration {
        Duration::from_millis(self.min_rest_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn evaluate_interval(&self) -> Duration {
        Duration::from_millis(self.evaluate_interval_ms.max(10))
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_millis(self.snapshot_ttl_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ws_freshness_ms == 0 {
            return Err("ws_freshness_ms must be positive".to_string());
        }
        if self.stale_threshold_ms > self.offline_threshold_ms {
            return Err(format!(
                "stale_threshold_ms ({}) must not exceed offline_threshold_ms ({})",
                self.stale_threshold_ms, self.offline_threshold_ms
            ));
        }
        Ok(())
    }
}
