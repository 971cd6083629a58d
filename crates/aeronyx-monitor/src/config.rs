//! Application configuration.

use crate::error::{AppError, AppResult};
use crate::wallet::KeySource;
use aeronyx_cache::CacheConfig;
use aeronyx_core::{SignatureScheme, WalletType};
use aeronyx_rest::RestConfig;
use aeronyx_sync::ReconcilerConfig;
use aeronyx_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Endpoint overrides, checked in order. The `NEXT_PUBLIC_*` names are kept
/// for deployments that share an environment with the web dashboard.
const API_URL_VARS: [&str; 2] = ["AERONYX_API_URL", "NEXT_PUBLIC_API_URL"];
const WS_URL_VARS: [&str; 2] = ["AERONYX_WS_URL", "NEXT_PUBLIC_WS_URL"];

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: RestConfig,
    #[serde(default)]
    pub websocket: ConnectionConfig,
    #[serde(default)]
    pub dashboard: ReconcilerConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Environment variable holding the hex private key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Key file; takes precedence over `key_env`.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Reported to the backend as `wallet_type`. Must be an EVM family.
    #[serde(default = "default_wallet_type")]
    pub wallet_type: WalletType,
}

fn default_key_env() -> String {
    "AERONYX_WALLET_KEY".to_string()
}

fn default_wallet_type() -> WalletType {
    WalletType::Metamask
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            key_file: None,
            wallet_type: default_wallet_type(),
        }
    }
}

impl WalletConfig {
    pub fn key_source(&self) -> KeySource {
        match &self.key_file {
            Some(path) => KeySource::File { path: path.clone() },
            None => KeySource::EnvVar {
                var_name: self.key_env.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Persist credentials here so a restart does not prompt again.
    #[serde(default)]
    pub credential_dir: Option<PathBuf>,
    /// How long a signed challenge is reused.
    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,
}

fn default_validity_secs() -> u64 {
    600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credential_dir: None,
            validity_secs: default_validity_secs(),
        }
    }
}

impl AuthConfig {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Per-namespace entry cap.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_entries() -> usize {
    256
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::default();
        config.defaults.default_ttl = Duration::from_secs(self.default_ttl_secs);
        config.defaults.max_entries = self.max_entries;
        config
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Write the Prometheus text export here periodically.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
    /// Log a dashboard summary at most this often.
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    15
}

fn default_summary_interval_secs() -> u64 {
    60
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_path: None,
            metrics_interval_secs: default_metrics_interval_secs(),
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Read `path` (defaults when it does not exist), apply environment
    /// overrides and validate.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            info!(path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply endpoint overrides looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .copied()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(api_url) = first(&API_URL_VARS[..]) {
            info!(api_url = %api_url, "API URL overridden from environment");
            self.api.api_url = api_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(ws_origin) = first(&WS_URL_VARS[..]) {
            self.websocket.url = ConnectionConfig::endpoint(ws_origin.trim());
            info!(url = %self.websocket.url, "WebSocket URL overridden from environment");
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.api.validate().map_err(AppError::Config)?;
        self.dashboard.validate().map_err(AppError::Config)?;

        if !(self.websocket.url.starts_with("ws://") || self.websocket.url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "websocket.url must be ws(s): {}",
                self.websocket.url
            )));
        }
        if self.wallet.wallet_type.scheme() != SignatureScheme::HexPrefixed {
            return Err(AppError::Config(format!(
                "wallet.wallet_type {} cannot be backed by a local EVM key",
                self.wallet.wallet_type
            )));
        }
        if self.auth.validity_secs == 0 {
            return Err(AppError::Config("auth.validity_secs must be positive".into()));
        }
        if self.cache.max_entries == 0 || self.cache.sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "cache.max_entries and cache.sweep_interval_secs must be positive".into(),
            ));
        }
        if self.telemetry.metrics_path.is_some() && self.telemetry.metrics_interval_secs == 0 {
            return Err(AppError::Config(
                "telemetry.metrics_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
