//! Feeds monitoring socket events into the reconciler.

use crate::reconciler::ReconcilerHandle;
use aeronyx_ws::{ConnectionManager, WsEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Route state changes and updates to `reconciler`. Every other event goes
/// to `forward` when given.
pub fn spawn_ws_bridge(
    mut events: mpsc::Receiver<WsEvent>,
    connection: Arc<ConnectionManager>,
    reconciler: ReconcilerHandle,
    forward: Option<mpsc::Sender<WsEvent>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_latency = None;
        while let Some(event) = events.recv().await {
            match event {
                WsEvent::StateChanged { to, .. } => {
                    last_latency = connection.health().latency_ms;
                    reconciler.connection_changed(to, last_latency).await;
                }
                WsEvent::Update(update) => {
                    let latency = connection.health().latency_ms;
                    if latency != last_latency {
                        last_latency = latency;
                        reconciler
                            .connection_changed(connection.state(), latency)
                            .await;
                    }
                    reconciler.push_update(update).await;
                }
                other => match &forward {
                    Some(tx) => {
                        if tx.send(other).await.is_err() {
                            debug!("Event forward target dropped");
                        }
                    }
                    None => debug!(event = ?other, "Unrouted socket event"),
                },
            }
        }
        debug!("Socket event stream ended");
    })
}
