//! WebSocket monitoring client for AeroNyx nodes.
//!
//! Provides the user-monitor socket with:
//! - Wallet-signature authentication through `SignatureManager`
//! - Automatic reconnection with exponential backoff (bounded attempts)
//! - Heartbeat ping/pong with rolling latency
//! - Node subscriptions and monitoring restored after reconnect
//! - Channel-based event delivery and write handle

pub mod backoff;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod subscription;
pub mod ws_write_handle;

pub use backoff::BackoffPolicy;
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, WsEvent, WsHealth, NO_RETRY_CLOSE_CODES,
};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatManager;
pub use message::{
    is_pass_through, is_recoverable_auth_code, ClientFrame, RealTimeUpdate, ServerFrame,
    UpdatePayload, WsConnection, WsNode, WsPerformance,
};
pub use subscription::SubscriptionManager;
pub use ws_write_handle::{WsOutbound, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
