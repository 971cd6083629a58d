//! Prometheus metrics and structured logging for the AeroNyx node monitor.
//!
//! - Prometheus metrics for the WebSocket session, REST calls and the
//!   reconciled dashboard view
//! - Structured logging with tracing (JSON in production)
//! - Periodic text export of the metric registry

pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use export::{render_metrics, spawn_metrics_dump, write_metrics};
pub use logging::init_logging;
pub use metrics::Metrics;
