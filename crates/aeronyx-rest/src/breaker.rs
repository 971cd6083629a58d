//! Circuit breaker.
//!
//! ## States
//!
//! - Closed: calls pass; consecutive transient failures are counted
//! - Open: calls fail fast until `recovery_timeout` has elapsed
//! - HalfOpen: exactly one trial call is admitted; its outcome closes or
//!   reopens the circuit

use aeronyx_telemetry::Metrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Start of the admitted half-open trial.
    trial_started_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn state(&self) -> CircuitState {
        Self::state_at(&self.state.lock(), &self.config, Instant::now())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    fn state_at(state: &BreakerState, config: &BreakerConfig, now: Instant) -> CircuitState {
        match state.opened_at {
            None => CircuitState::Closed,
            Some(opened) if now.duration_since(opened) < config.recovery_timeout() => {
                CircuitState::Open
            }
            Some(_) => CircuitState::HalfOpen,
        }
    }

    /// Ask to make a call. `false` means fail fast without I/O.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        match Self::state_at(&state, &self.config, now) {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                // A trial whose caller vanished must not wedge the breaker.
                let trial_pending = state
                    .trial_started_at
                    .is_some_and(|t| now.duration_since(t) < self.config.recovery_timeout());
                if trial_pending {
                    false
                } else {
                    state.trial_started_at = Some(now);
                    info!("Circuit half-open, admitting trial request");
                    true
                }
            }
        }
    }

    /// A call succeeded.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        let was_open = state.opened_at.is_some();
        *state = BreakerState::default();
        if was_open {
            info!("Circuit closed after successful trial");
            Metrics::circuit_open(false);
        }
    }

    /// A call failed with a transient error.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.opened_at.is_some() {
            // Failed trial
            state.opened_at = Some(now);
            state.trial_started_at = None;
            warn!("Circuit trial failed, reopening");
            Metrics::circuit_open(true);
            return;
        }

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures >= self.config.failure_threshold {
            state.opened_at = Some(now);
            warn!(
                failures = state.consecutive_failures,
                recovery_secs = self.config.recovery_timeout_secs,
                "Circuit opened"
            );
            Metrics::circuit_open(true);
        }
    }

    /// A call got an answer that says nothing about server health (4xx).
    ///
    /// The streak is left as is; a half-open trial that got any answer
    /// proves the server is reachable and closes the circuit.
    pub fn record_non_transient(&self) {
        let in_trial = self.state.lock().trial_started_at.is_some();
        if in_trial {
            self.record_success();
        }
    }
}
