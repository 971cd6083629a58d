//! Reconnect backoff policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential reconnect backoff.
///
/// Attempt `k` (1-based) waits `min(base * multiplier^(k-1), max_delay)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Failed reconnect attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (1..=7)
            .map(|k| policy.delay(k).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_delay_non_decreasing_until_capped() {
        let policy = BackoffPolicy {
            base_delay_ms: 300,
            multiplier: 1.5,
            max_delay_ms: 5000,
            max_attempts: 20,
        };
        let mut previous = Duration::ZERO;
        for k in 1..=20 {
            let d = policy.delay(k);
            assert!(d >= previous, "attempt {k}: {d:?} < {previous:?}");
            assert!(d <= Duration::from_millis(5000));
            previous = d;
        }
        assert_eq!(previous, Duration::from_millis(5000));
    }

    #[test]
    fn test_exhausted() {
        let policy = BackoffPolicy::default();
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }
}
