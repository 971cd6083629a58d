//! Monitoring socket connection manager.
//!
//! A single driver task owns the socket and runs
//! connect -> authenticate -> monitor, reconnecting with exponential backoff
//! after abnormal closures. Callers observe the state through a `watch`
//! channel, receive frames as `WsEvent`s and write through `WsWriteHandle`.

use crate::backoff::BackoffPolicy;
use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::{is_recoverable_auth_code, ClientFrame, RealTimeUpdate, ServerFrame};
use crate::subscription::SubscriptionManager;
use crate::ws_write_handle::{OutboundSlot, WsOutbound, WsWriteHandle};
use aeronyx_auth::{SignatureManager, WalletSigner};
use aeronyx_core::Credential;
use aeronyx_telemetry::Metrics;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Server close codes after which no reconnect is scheduled:
/// normal closure, account locked, too many auth attempts.
pub const NO_RETRY_CLOSE_CODES: [u16; 3] = [1000, 4003, 4004];

const OUTBOUND_CAPACITY: usize = 64;

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Monitoring endpoint, `{ws_url}/ws/aeronyx/user-monitor/`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Credential purpose used for socket authentication.
    #[serde(default = "default_auth_purpose")]
    pub auth_purpose: String,
    /// Bound on connect plus the auth handshake.
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Send auth unprompted if the server stays silent this long.
    #[serde(default = "default_auth_grace_ms")]
    pub auth_grace_ms: u64,
    /// Ping after this much silence.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Pong must arrive within this.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

fn default_url() -> String {
    "wss://api.aeronyx.network/ws/aeronyx/user-monitor/".to_string()
}

fn default_auth_purpose() -> String {
    "websocket".to_string()
}

fn default_auth_timeout_ms() -> u64 {
    10_000
}

fn default_auth_grace_ms() -> u64 {
    2_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            auth_purpose: default_auth_purpose(),
            auth_timeout_ms: default_auth_timeout_ms(),
            auth_grace_ms: default_auth_grace_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Monitoring endpoint under a WebSocket origin.
    pub fn endpoint(ws_origin: &str) -> String {
        format!("{}/ws/aeronyx/user-monitor/", ws_origin.trim_end_matches('/'))
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
    Monitoring,
    Reconnecting,
    /// Terminal until `connect()` is called again.
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Monitoring => "monitoring",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// A socket is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated | Self::Monitoring)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Monitoring)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivered to the owner in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Authenticated {
        wallet_address: String,
    },
    MonitoringStarted,
    MonitoringStopped,
    Update(RealTimeUpdate),
    ServerError {
        code: Option<String>,
        message: String,
    },
    /// Terminal and remote-command frames, untouched.
    PassThrough {
        frame_type: String,
        payload: Value,
    },
}

/// Connection health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsHealth {
    pub state: ConnectionState,
    /// Rolling ping/pong average.
    pub latency_ms: Option<f64>,
    pub reconnect_attempt: u32,
    /// Only while a socket is open.
    pub last_message_age_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// How a session ended, and so what the driver does next.
enum SessionEnd {
    /// `disconnect()` was called.
    Cancelled,
    /// Server closed with a do-not-retry code.
    Closed { code: u16, reason: String },
    /// Stop without reconnecting.
    Fatal(WsError),
    /// Reconnect with backoff.
    Abnormal(WsError),
}

struct Session {
    credential: Credential,
    auth_sent: bool,
    authenticated: bool,
    grace_deadline: Instant,
    auth_deadline: Instant,
}

struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    signatures: SignatureManager,
    wallet: Arc<dyn WalletSigner>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::Sender<WsEvent>,
    heartbeat: HeartbeatManager,
    subscriptions: SubscriptionManager,
    outbound: OutboundSlot,
    pending: DashMap<String, oneshot::Sender<Value>>,
    driver: Mutex<Option<Driver>>,
    close_request: Mutex<Option<(u16, String)>>,
    reconnect_attempt: AtomicU32,
    auth_retry_used: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        signatures: SignatureManager,
        wallet: Arc<dyn WalletSigner>,
        event_tx: mpsc::Sender<WsEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            heartbeat: HeartbeatManager::new(
                Duration::from_millis(config.heartbeat_interval_ms),
                Duration::from_millis(config.heartbeat_timeout_ms),
            ),
            config,
            signatures,
            wallet,
            state_tx,
            event_tx,
            subscriptions: SubscriptionManager::new(),
            outbound: Arc::new(RwLock::new(None)),
            pending: DashMap::new(),
            driver: Mutex::new(None),
            close_request: Mutex::new(None),
            reconnect_attempt: AtomicU32::new(0),
            auth_retry_used: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Get a write handle for sending frames.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(Arc::clone(&self.outbound))
    }

    pub fn health(&self) -> WsHealth {
        let state = self.state();
        WsHealth {
            state,
            latency_ms: self.heartbeat.average_latency_ms(),
            reconnect_attempt: self.reconnect_attempt.load(Ordering::SeqCst),
            last_message_age_ms: state
                .is_open()
                .then(|| self.heartbeat.last_message_age().as_millis() as u64),
            last_error: self.last_error.read().clone(),
        }
    }

    /// Start the driver. No-op while one is already running.
    pub fn connect(self: &Arc<Self>) {
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            debug!("Connection driver already running");
            return;
        }

        self.reconnect_attempt.store(0, Ordering::SeqCst);
        self.auth_retry_used.store(false, Ordering::SeqCst);
        *self.close_request.lock() = None;
        *self.last_error.write() = None;
        self.set_state(ConnectionState::Connecting);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run(cancel.clone()));
        *driver = Some(Driver { cancel, handle });
    }

    /// Close the socket with `code` and stop reconnecting. Cancels a pending
    /// backoff sleep.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        info!(code, reason, "Disconnect requested");
        *self.close_request.lock() = Some((code, reason.to_string()));

        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.cancel.cancel();
            if let Err(e) = driver.handle.await {
                warn!(error = %e, "Connection driver ended abnormally");
            }
        }
        self.end_session();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Ask for live updates. Sent now if authenticated, otherwise right
    /// after the next successful authentication.
    pub async fn start_monitoring(&self) -> WsResult<()> {
        self.subscriptions.set_monitoring(true);
        if self.state().is_authenticated() {
            self.send(&ClientFrame::StartMonitoring).await?;
        }
        Ok(())
    }

    pub async fn stop_monitoring(&self) -> WsResult<()> {
        self.subscriptions.set_monitoring(false);
        if self.state().is_authenticated() {
            self.send(&ClientFrame::StopMonitoring).await?;
        }
        Ok(())
    }

    /// Track a node; the subscription survives reconnects.
    pub async fn subscribe_to_node(&self, reference_code: &str) -> WsResult<()> {
        let reference_code = require_reference(reference_code)?;
        self.subscriptions.add_node(reference_code);
        if self.state().is_authenticated() {
            self.send(&ClientFrame::SubscribeNode {
                reference_code: reference_code.to_string(),
            })
            .await?;
        }
        Ok(())
    }

    pub async fn unsubscribe_from_node(&self, reference_code: &str) -> WsResult<()> {
        let reference_code = require_reference(reference_code)?;
        let tracked = self.subscriptions.remove_node(reference_code);
        if tracked && self.state().is_authenticated() {
            self.send(&ClientFrame::UnsubscribeNode {
                reference_code: reference_code.to_string(),
            })
            .await?;
        }
        Ok(())
    }

    pub fn subscribed_nodes(&self) -> Vec<String> {
        self.subscriptions.nodes()
    }

    /// Send a frame on the open socket. Fails with `NotOpen` otherwise.
    pub async fn send(&self, frame: &ClientFrame) -> WsResult<()> {
        self.write_handle().send(frame).await
    }

    pub async fn send_json(&self, frame: &Value) -> WsResult<()> {
        self.write_handle().send_json(frame).await
    }

    /// Send `frame` with a fresh `request_id` and wait for the server frame
    /// that echoes it.
    pub async fn request(&self, mut frame: Value, timeout: Option<Duration>) -> WsResult<Value> {
        let Value::Object(map) = &mut frame else {
            return Err(WsError::InvalidFrame(
                "request frame must be a JSON object".to_string(),
            ));
        };
        let request_id = Uuid::new_v4().to_string();
        map.insert("request_id".into(), Value::String(request_id.clone()));

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        if let Err(e) = self.send_json(&frame).await {
            self.pending.remove(&request_id);
            return Err(e);
        }

        let timeout = timeout.unwrap_or_else(|| self.config.request_timeout());
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(WsError::RequestCancelled),
            Err(_) => {
                self.pending.remove(&request_id);
                warn!(request_id = %request_id, "Request timed out");
                Err(WsError::RequestTimeout(timeout))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------------

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let end = self.run_session(&cancel).await;
            self.end_session();

            let error = match end {
                SessionEnd::Cancelled => {
                    info!("Connection closed by client");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                SessionEnd::Closed { code, reason } => {
                    info!(code, %reason, "Server closed the connection, not reconnecting");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                SessionEnd::Fatal(e) => {
                    error!(error = %e, "Connection failed permanently");
                    self.record_error(&e);
                    self.set_state(ConnectionState::Error);
                    return;
                }
                SessionEnd::Abnormal(e) => e,
            };

            warn!(error = %error, "Connection lost");
            self.record_error(&error);

            let failed = self.reconnect_attempt.load(Ordering::SeqCst);
            if self.config.backoff.exhausted(failed) {
                error!(attempts = failed, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Error);
                return;
            }

            let attempt = failed + 1;
            self.reconnect_attempt.store(attempt, Ordering::SeqCst);
            let delay = self.config.backoff.delay(attempt);
            Metrics::ws_reconnect(reconnect_reason(&error));
            self.set_state(ConnectionState::Reconnecting);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    info!("Disconnect requested during backoff");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
            self.set_state(ConnectionState::Connecting);
        }
    }

    async fn run_session(&self, cancel: &CancellationToken) -> SessionEnd {
        let credential = tokio::select! {
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            result = self
                .signatures
                .ensure_credential(Arc::clone(&self.wallet), &self.config.auth_purpose) => match result {
                Ok(credential) => credential,
                Err(e) if e.is_retryable() => return SessionEnd::Abnormal(e.into()),
                Err(e) => return SessionEnd::Fatal(e.into()),
            },
        };

        info!(url = %self.config.url, "Connecting to monitoring socket");
        let auth_timeout = self.config.auth_timeout();
        let started = Instant::now();
        // TCP_NODELAY: frames are small and latency-sensitive.
        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let stream = tokio::select! {
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            result = tokio::time::timeout(auth_timeout, connect) => match result {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => return SessionEnd::Abnormal(WsError::ConnectionFailed(e.to_string())),
                Err(_) => return SessionEnd::Abnormal(WsError::AuthTimeout(auth_timeout)),
            },
        };
        let (mut write, mut read) = stream.split();

        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        *self.outbound.write() = Some(tx);
        self.heartbeat.reset();
        Metrics::ws_connected();
        self.set_state(ConnectionState::Connected);

        let mut session = Session {
            credential,
            auth_sent: false,
            authenticated: false,
            grace_deadline: Instant::now() + Duration::from_millis(self.config.auth_grace_ms),
            auth_deadline: started + auth_timeout,
        };

        let period = self.heartbeat.check_period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    let (code, reason) = self
                        .close_request
                        .lock()
                        .clone()
                        .unwrap_or_else(|| (1000, "client disconnect".to_string()));
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        warn!(error = %e, "Failed to send Close frame");
                    }
                    return SessionEnd::Cancelled;
                }

                msg = read.next() => {
                    let step = match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text, &mut session, &mut write).await
                        }
                        Some(Ok(Message::Ping(data))) => write
                            .send(Message::Pong(data))
                            .await
                            .err()
                            .map(|e| SessionEnd::Abnormal(e.into())),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            Some(classify_close(code, reason))
                        }
                        Some(Ok(_)) => None,
                        Some(Err(e)) => Some(SessionEnd::Abnormal(e.into())),
                        None => Some(SessionEnd::Abnormal(WsError::ConnectionClosed {
                            code: 1006,
                            reason: "stream ended".to_string(),
                        })),
                    };
                    if let Some(end) = step {
                        return end;
                    }
                }

                Some(outbound) = rx.recv() => {
                    let WsOutbound::Text(text) = outbound;
                    if let Err(e) = write.send(Message::Text(text)).await {
                        return SessionEnd::Abnormal(e.into());
                    }
                }

                () = tokio::time::sleep_until(session.grace_deadline), if !session.auth_sent => {
                    debug!("Server sent no challenge prompt, authenticating unprompted");
                    if let Err(end) = self.send_auth(&mut session, &mut write).await {
                        return end;
                    }
                }

                () = tokio::time::sleep_until(session.auth_deadline), if !session.authenticated => {
                    warn!(timeout_ms = auth_timeout.as_millis() as u64, "Authentication timed out");
                    Metrics::ws_auth("timeout");
                    return SessionEnd::Abnormal(WsError::AuthTimeout(auth_timeout));
                }

                _ = ticker.tick() => {
                    if self.heartbeat.is_timed_out() {
                        error!("Heartbeat timeout");
                        return SessionEnd::Abnormal(WsError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        if let Err(e) = send_frame(&mut write, &ClientFrame::ping_now()).await {
                            return SessionEnd::Abnormal(e);
                        }
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        session: &mut Session,
        write: &mut WsSink,
    ) -> Option<SessionEnd> {
        self.heartbeat.record_message();

        let (frame, raw) = match ServerFrame::parse(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable frame");
                return None;
            }
        };
        Metrics::ws_message(frame.type_name());

        if let Some(request_id) = raw.get("request_id").and_then(Value::as_str) {
            if let Some((_, waiter)) = self.pending.remove(request_id) {
                if waiter.send(raw).is_err() {
                    debug!("Request caller went away");
                }
                return None;
            }
        }

        match frame {
            ServerFrame::ConnectionEstablished { .. } | ServerFrame::SignatureMessage { .. } => {
                if !session.auth_sent {
                    return self.send_auth(session, write).await.err();
                }
            }
            ServerFrame::AuthSuccess { .. } => {
                session.authenticated = true;
                self.reconnect_attempt.store(0, Ordering::SeqCst);
                self.auth_retry_used.store(false, Ordering::SeqCst);
                Metrics::ws_auth("success");
                self.set_state(ConnectionState::Authenticated);
                info!(wallet = %session.credential.wallet_address, "Authenticated");
                self.emit(WsEvent::Authenticated {
                    wallet_address: session.credential.wallet_address.clone(),
                })
                .await;

                for frame in self.subscriptions.restore_frames() {
                    if let Err(e) = send_frame(write, &frame).await {
                        return Some(SessionEnd::Abnormal(e));
                    }
                }
            }
            ServerFrame::AuthFailed { code, message } => {
                Metrics::ws_auth("failed");
                let recoverable = is_recoverable_auth_code(&code);
                let err = WsError::AuthFailed { code, message };
                if recoverable && !self.auth_retry_used.swap(true, Ordering::SeqCst) {
                    warn!(error = %err, "Credential rejected, signing a fresh one");
                    self.signatures.invalidate_purpose(
                        &session.credential.wallet_address,
                        &self.config.auth_purpose,
                    );
                    return Some(SessionEnd::Abnormal(err));
                }
                return Some(SessionEnd::Fatal(err));
            }
            ServerFrame::MonitoringStarted => {
                if session.authenticated {
                    self.set_state(ConnectionState::Monitoring);
                }
                self.emit(WsEvent::MonitoringStarted).await;
            }
            ServerFrame::MonitoringStopped => {
                if session.authenticated {
                    self.set_state(ConnectionState::Authenticated);
                }
                self.emit(WsEvent::MonitoringStopped).await;
            }
            ServerFrame::RealTimeUpdate(update) => {
                self.emit(WsEvent::Update(update)).await;
            }
            ServerFrame::Pong { .. } => {
                if let Some(rtt_ms) = self.heartbeat.record_pong() {
                    Metrics::ws_latency(rtt_ms);
                }
            }
            ServerFrame::Error { code, message } => {
                warn!(?code, %message, "Server reported an error");
                self.emit(WsEvent::ServerError { code, message }).await;
            }
            ServerFrame::PassThrough {
                frame_type,
                payload,
            } => {
                self.emit(WsEvent::PassThrough {
                    frame_type,
                    payload,
                })
                .await;
            }
            ServerFrame::Unknown { frame_type } => {
                debug!(%frame_type, "Ignoring unknown frame type");
            }
        }
        None
    }

    async fn send_auth(&self, session: &mut Session, write: &mut WsSink) -> Result<(), SessionEnd> {
        session.auth_sent = true;
        debug!(wallet = %session.credential.wallet_address, "Sending auth frame");
        send_frame(write, &ClientFrame::auth(&session.credential))
            .await
            .map_err(SessionEnd::Abnormal)
    }

    /// Drop the per-session sender and fail every pending request.
    fn end_session(&self) {
        if self.outbound.write().take().is_some() {
            Metrics::ws_disconnected();
        }
        self.pending.clear();
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous == next {
            return;
        }
        Metrics::ws_state_set(next.as_str());
        info!(from = %previous, to = %next, "Connection state changed");
        if let Err(e) = self.event_tx.try_send(WsEvent::StateChanged {
            from: previous,
            to: next,
        }) {
            debug!(error = %e, "State change event not delivered");
        }
    }

    async fn emit(&self, event: WsEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn record_error(&self, error: &WsError) {
        *self.last_error.write() = Some(error.to_string());
    }
}

async fn send_frame(write: &mut WsSink, frame: &ClientFrame) -> WsResult<()> {
    write.send(Message::Text(frame.to_text()?)).await?;
    Ok(())
}

fn classify_close(code: u16, reason: String) -> SessionEnd {
    if NO_RETRY_CLOSE_CODES.contains(&code) {
        SessionEnd::Closed { code, reason }
    } else {
        SessionEnd::Abnormal(WsError::ConnectionClosed { code, reason })
    }
}

fn reconnect_reason(error: &WsError) -> &'static str {
    match error {
        WsError::HeartbeatTimeout => "heartbeat_timeout",
        WsError::AuthTimeout(_) => "auth_timeout",
        WsError::AuthFailed { .. } => "auth_expired",
        WsError::ConnectionFailed(_) => "connect_failed",
        WsError::Credential(_) => "credential",
        _ => "abnormal_close",
    }
}

fn require_reference(reference_code: &str) -> WsResult<&str> {
    let trimmed = reference_code.trim();
    if trimmed.is_empty() {
        return Err(WsError::InvalidFrame(
            "reference_code must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
