//! REST client configuration.

use crate::breaker::BreakerConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// REST client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    /// API origin, e.g. `https://api.aeronyx.network`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Path prefix of every endpoint.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub cache_ttl: CacheTtlConfig,
}

fn default_api_url() -> String {
    "https://api.aeronyx.network".to_string()
}

fn default_base_path() -> String {
    "/api/aeronyx".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            base_path: default_base_path(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            cache_ttl: CacheTtlConfig::default(),
        }
    }
}

impl RestConfig {
    /// Origin and prefix joined, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.base_path.trim_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(format!("api_url must be http(s): {}", self.api_url));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be positive".to_string());
        }
        if self.breaker.failure_threshold == 0 {
            return Err("breaker.failure_threshold must be positive".to_string());
        }
        Ok(())
    }
}

/// Response cache lifetimes per endpoint family, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_overview_secs")]
    pub overview_secs: u64,
    #[serde(default = "default_detailed_status_secs")]
    pub detailed_status_secs: u64,
    #[serde(default = "default_history_secs")]
    pub history_secs: u64,
    /// Node types and node resources.
    #[serde(default = "default_catalog_secs")]
    pub catalog_secs: u64,
}

fn default_overview_secs() -> u64 {
    30
}

fn default_detailed_status_secs() -> u64 {
    15
}

fn default_history_secs() -> u64 {
    60
}

fn default_catalog_secs() -> u64 {
    600
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            overview_secs: default_overview_secs(),
            detailed_status_secs: default_detailed_status_secs(),
            history_secs: default_history_secs(),
            catalog_secs: default_catalog_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_joins_cleanly() {
        let config = RestConfig {
            api_url: "http://localhost:8000/".to_string(),
            ..RestConfig::default()
        };
        assert_eq!(config.base_url(), "http://localhost:8000/api/aeronyx");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RestConfig = from_json(r#"{"api_url": "http://x", "retry": {"max_retries": 1}}"#);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.cache_ttl.overview_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = RestConfig {
            api_url: "ftp://x".to_string(),
            ..RestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    fn from_json(json: &str) -> RestConfig {
        serde_json::from_str(json).unwrap()
    }
}
