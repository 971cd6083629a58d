//! Headless AeroNyx node monitor.
//!
//! Runs the monitoring engine outside a browser:
//! - a local key-backed EVM wallet answering signature challenges
//! - TOML configuration with environment overrides
//! - the live dashboard (REST snapshots merged with WebSocket updates)
//! - one-shot REST queries

pub mod app;
pub mod config;
pub mod error;
pub mod wallet;

pub use app::Application;
pub use config::{AppConfig, AuthConfig, CacheSettings, TelemetryConfig, WalletConfig};
pub use error::{AppError, AppResult};
pub use wallet::{KeyError, KeySource, LocalWallet};
