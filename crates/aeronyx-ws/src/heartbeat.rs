//! Heartbeat and latency tracking for the monitoring socket.
//!
//! A `ping` is sent after `interval` of silence. The matching `pong` closes
//! the round trip and feeds a rolling latency average over the last
//! `LATENCY_SAMPLES` samples. A ping left unanswered for `timeout` marks the
//! connection dead.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Samples kept for the rolling latency average.
pub const LATENCY_SAMPLES: usize = 10;

#[derive(Debug)]
struct State {
    last_ping: Option<Instant>,
    last_message: Instant,
    waiting_for_pong: bool,
    samples: VecDeque<f64>,
}

#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    timeout: Duration,
    state: RwLock<State>,
}

impl HeartbeatManager {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            state: RwLock::new(State {
                last_ping: None,
                last_message: Instant::now(),
                waiting_for_pong: false,
                samples: VecDeque::with_capacity(LATENCY_SAMPLES),
            }),
        }
    }

    /// Reset per-connection state. Latency history survives reconnects.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.last_ping = None;
        state.last_message = Instant::now();
        state.waiting_for_pong = false;
    }

    pub fn record_ping(&self) {
        let mut state = self.state.write();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    /// Close the round trip. Returns the measured latency in milliseconds,
    /// or `None` for an unsolicited pong.
    pub fn record_pong(&self) -> Option<f64> {
        let mut state = self.state.write();
        if !state.waiting_for_pong {
            return None;
        }
        state.waiting_for_pong = false;
        let rtt_ms = state.last_ping?.elapsed().as_secs_f64() * 1000.0;

        if state.samples.len() == LATENCY_SAMPLES {
            state.samples.pop_front();
        }
        state.samples.push_back(rtt_ms);
        debug!(rtt_ms, "Received pong");
        Some(rtt_ms)
    }

    pub fn record_message(&self) {
        self.state.write().last_message = Instant::now();
    }

    pub fn is_timed_out(&self) -> bool {
        let state = self.state.read();
        match (state.waiting_for_pong, state.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// Send only after `interval` of silence and with no ping outstanding.
    pub fn should_send_ping(&self) -> bool {
        let state = self.state.read();
        !state.waiting_for_pong && state.last_message.elapsed() >= self.interval
    }

    /// How often the driver checks the heartbeat.
    pub fn check_period(&self) -> Duration {
        (self.interval.min(self.timeout) / 2).max(Duration::from_millis(10))
    }

    /// Rolling average round trip in milliseconds.
    pub fn average_latency_ms(&self) -> Option<f64> {
        let state = self.state.read();
        if state.samples.is_empty() {
            return None;
        }
        Some(state.samples.iter().sum::<f64>() / state.samples.len() as f64)
    }

    pub fn last_message_age(&self) -> Duration {
        self.state.read().last_message.elapsed()
    }
}
