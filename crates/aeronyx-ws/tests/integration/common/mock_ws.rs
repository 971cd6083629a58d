//! Mock user-monitor server for integration tests.
//!
//! Speaks enough of the monitoring protocol to drive the client through its
//! lifecycle:
//! - Announce `connection_established` on accept (optional)
//! - Answer `auth` with success or a scripted `auth_failed`
//! - Answer `start_monitoring` with `monitoring_started` and one update
//! - Echo `ping` as `pong` (optional)
//! - Answer `remote_command` with a response echoing `request_id`
//! - Drop or close live connections on command
//! - Record every received frame

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Send `connection_established` right after the handshake.
    pub announce: bool,
    /// Reply to `auth` at all.
    pub accept_auth: bool,
    /// Codes for the next `auth_failed` replies, consumed in order.
    pub auth_failures: VecDeque<String>,
    pub answer_pings: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            announce: true,
            accept_auth: true,
            auth_failures: VecDeque::new(),
            answer_pings: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Command {
    /// Drop the TCP connection without a closing handshake.
    Drop,
    Close(u16),
    Push(Value),
}

struct Shared {
    behavior: Mutex<MockBehavior>,
    frames: Mutex<Vec<Value>>,
    connections: AtomicUsize,
}

pub struct MockMonitorServer {
    addr: SocketAddr,
    stop: CancellationToken,
    commands: broadcast::Sender<Command>,
    shared: Arc<Shared>,
}

impl MockMonitorServer {
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::default()).await
    }

    pub async fn start_with(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, _) = broadcast::channel(16);
        let stop = CancellationToken::new();
        let shared = Arc::new(Shared {
            behavior: Mutex::new(behavior),
            frames: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });

        let accept_stop = stop.clone();
        let accept_commands = commands.clone();
        let accept_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = accept_stop.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            tokio::spawn(handle_connection(
                                stream,
                                accept_shared.clone(),
                                accept_commands.subscribe(),
                            ));
                        }
                        Err(_) => break,
                    },
                }
            }
            // Listener dropped here: later connects are refused.
        });

        Self {
            addr,
            stop,
            commands,
            shared,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/aeronyx/user-monitor/", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Value> {
        self.shared.frames.lock().clone()
    }

    pub fn received_of_type(&self, frame_type: &str) -> Vec<Value> {
        self.shared
            .frames
            .lock()
            .iter()
            .filter(|f| f["type"] == frame_type)
            .cloned()
            .collect()
    }

    pub fn fail_next_auth(&self, code: &str) {
        self.shared
            .behavior
            .lock()
            .auth_failures
            .push_back(code.to_string());
    }

    /// Kill live sockets abruptly (client sees code 1006).
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    pub fn close_connections(&self, code: u16) {
        let _ = self.commands.send(Command::Close(code));
    }

    pub fn push(&self, frame: Value) {
        let _ = self.commands.send(Command::Push(frame));
    }

    /// Stop accepting and drop live sockets.
    pub fn shutdown(&self) {
        self.stop.cancel();
        self.drop_connections();
    }
}

pub fn sample_update(sequence: u64) -> Value {
    json!({
        "type": "real_time_update",
        "sequence": sequence,
        "timestamp": "2026-10-17T12:00:00Z",
        "data": {
            "summary": {"total_nodes": 2, "active_nodes": 1, "offline_nodes": 1},
            "nodes": [
                {
                    "reference_code": "AERO-1",
                    "name": "edge-1",
                    "status": "active",
                    "performance": {"cpu": 40, "memory": 60, "disk": 10, "network": 25},
                    "earnings": "1.25",
                    "connection": {"connected": true, "last_heartbeat": "2026-10-17T11:59:55Z"}
                },
                {
                    "reference_code": "AERO-2",
                    "name": "edge-2",
                    "status": "offline",
                    "connection": {"connected": false}
                }
            ]
        }
    })
}

async fn handle_connection(
    stream: TcpStream,
    shared: Arc<Shared>,
    mut commands: broadcast::Receiver<Command>,
) {
    shared.connections.fetch_add(1, Ordering::SeqCst);

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let announce = shared.behavior.lock().announce;
    if announce {
        let hello = json!({"type": "connection_established", "message": "welcome"});
        let _ = write.send(Message::Text(hello.to_string())).await;
    }

    let mut sequence = 0;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Ok(Command::Push(frame)) => {
                    let _ = write.send(Message::Text(frame.to_string())).await;
                }
                Ok(Command::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "closing".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                }
                Ok(Command::Drop) | Err(_) => return,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    shared.frames.lock().push(frame.clone());
                    for reply in respond(&frame, &shared, &mut sequence) {
                        let _ = write.send(Message::Text(reply.to_string())).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => {}
            },
        }
    }
}

fn respond(frame: &Value, shared: &Shared, sequence: &mut u64) -> Vec<Value> {
    match frame["type"].as_str().unwrap_or_default() {
        "auth" => {
            let mut behavior = shared.behavior.lock();
            if let Some(code) = behavior.auth_failures.pop_front() {
                return vec![json!({"type": "auth_failed", "error_code": code, "message": "rejected"})];
            }
            if !behavior.accept_auth {
                return Vec::new();
            }
            vec![json!({"type": "auth_success", "wallet_address": frame["wallet_address"]})]
        }
        "get_message" => vec![json!({"type": "signature_message", "message": "sign me"})],
        "start_monitoring" => {
            *sequence += 1;
            vec![json!({"type": "monitoring_started"}), sample_update(*sequence)]
        }
        "stop_monitoring" => vec![json!({"type": "monitoring_stopped"})],
        "ping" if shared.behavior.lock().answer_pings => {
            vec![json!({"type": "pong", "timestamp": frame["timestamp"]})]
        }
        "remote_command" => vec![json!({
            "type": "remote_command_response",
            "request_id": frame["request_id"],
            "result": {"ok": true, "output": "up 3 days"}
        })],
        _ => Vec::new(),
    }
}
