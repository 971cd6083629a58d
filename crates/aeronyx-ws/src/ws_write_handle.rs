//! Channel-based send handle for the monitoring socket.
//!
//! The socket is owned by the driver task. Everyone else writes through this
//! handle, which only accepts frames while a socket is open: the driver
//! installs a fresh sender for each session and removes it when the session
//! ends, so nothing is ever queued for a future connection.

use crate::error::{WsError, WsResult};
use crate::message::ClientFrame;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outbound frame for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsOutbound {
    Text(String),
}

pub(crate) type OutboundSlot = Arc<RwLock<Option<mpsc::Sender<WsOutbound>>>>;

/// Cloneable write handle.
#[derive(Debug, Clone)]
pub struct WsWriteHandle {
    slot: OutboundSlot,
}

impl WsWriteHandle {
    pub(crate) fn new(slot: OutboundSlot) -> Self {
        Self { slot }
    }

    /// Queue a typed frame on the open socket.
    pub async fn send(&self, frame: &ClientFrame) -> WsResult<()> {
        self.send_text(frame.to_text()?).await
    }

    /// Queue a raw JSON frame (terminal and remote-command sub-protocol).
    pub async fn send_json(&self, frame: &Value) -> WsResult<()> {
        self.send_text(serde_json::to_string(frame)?).await
    }

    /// # Errors
    ///
    /// `WsError::NotOpen` when no socket is open or it closed while queuing.
    pub async fn send_text(&self, text: String) -> WsResult<()> {
        let tx = self.slot.read().clone().ok_or(WsError::NotOpen)?;
        tx.send(WsOutbound::Text(text))
            .await
            .map_err(|_| WsError::NotOpen)
    }

    pub fn is_open(&self) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}
