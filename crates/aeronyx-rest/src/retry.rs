//! Retry policy with exponential backoff.
//!
//! `delay(k) = min(initial_delay_ms * multiplier^(k-1), max_delay_ms)` for
//! the k-th retry (1-based). No jitter, so the schedule is reproducible.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Disable retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Delay before retry `attempt` (1-based).
///
/// Clamped to `[0, max_delay_ms]`; NaN, infinite and negative products
/// collapse to a bound rather than overflowing.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let base = (config.initial_delay_ms as f64) * config.backoff_multiplier.powi(exponent);

    let max = config.max_delay_ms as f64;
    let clamped = if base.is_nan() || base < 0.0 {
        0.0
    } else if base > max {
        max
    } else {
        base
    };

    Duration::from_millis((clamped as u64).min(config.max_delay_ms))
}
