//! Text export of the metric registry.
//!
//! The monitor has no HTTP surface, so metrics are rendered in the
//! Prometheus text format and written to a file that a node exporter's
//! textfile collector can pick up.

use crate::error::{TelemetryError, TelemetryResult};
use prometheus::{Encoder, TextEncoder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Render the default registry in the Prometheus text format.
pub fn render_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| TelemetryError::Encoding)
}

/// Write the rendered registry to `path`, replacing it atomically.
pub fn write_metrics(path: &Path) -> TelemetryResult<()> {
    let text = render_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Periodically write metrics to `path` until `cancel` fires.
pub fn spawn_metrics_dump(
    path: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    // Final snapshot on shutdown.
                    if let Err(e) = write_metrics(&path) {
                        warn!(path = %path.display(), error = %e, "Failed to write metrics");
                    }
                    debug!("Metrics dump stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = write_metrics(&path) {
                        warn!(path = %path.display(), error = %e, "Failed to write metrics");
                    }
                }
            }
        }
    })
}
