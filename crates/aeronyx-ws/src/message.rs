//! Monitoring socket frames.
//!
//! Every frame is a JSON object tagged by `type`. Client frames serialize
//! straight from `ClientFrame`. Server frames are parsed in two steps: the
//! tag is read first, then the body is decoded into the matching variant, so
//! an unknown or malformed frame never aborts the session.

use crate::error::{WsError, WsResult};
use aeronyx_core::{Credential, WalletType};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Client -> server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth {
        wallet_address: String,
        signature: String,
        message: String,
        wallet_type: WalletType,
    },
    /// Ask the server to (re)send a challenge.
    GetMessage { wallet_address: String },
    StartMonitoring,
    StopMonitoring,
    /// Client time in milliseconds since the epoch.
    Ping { timestamp: i64 },
    GetCurrentStatus,
    SubscribeNode { reference_code: String },
    UnsubscribeNode { reference_code: String },
}

impl ClientFrame {
    pub fn auth(credential: &Credential) -> Self {
        Self::Auth {
            wallet_address: credential.wallet_address.clone(),
            signature: credential.signature.clone(),
            message: credential.message.clone(),
            wallet_type: credential.wallet_type,
        }
    }

    pub fn ping_now() -> Self {
        Self::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn to_text(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Server -> client
// ============================================================================

/// A node as the monitoring socket reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WsNode {
    #[serde(default, alias = "code")]
    pub reference_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub performance: WsPerformance,
    #[serde(default, alias = "total_earnings")]
    pub earnings: Option<Decimal>,
    #[serde(default)]
    pub connection: WsConnection,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WsPerformance {
    #[serde(default, alias = "cpu_usage", deserialize_with = "null_as_zero")]
    pub cpu: f64,
    #[serde(default, alias = "memory_usage", deserialize_with = "null_as_zero")]
    pub memory: f64,
    #[serde(
        default,
        alias = "disk_usage",
        alias = "storage_usage",
        deserialize_with = "null_as_zero"
    )]
    pub disk: f64,
    #[serde(
        default,
        alias = "network_usage",
        alias = "bandwidth_usage",
        deserialize_with = "null_as_zero"
    )]
    pub network: f64,
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Option::<f64>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsConnection {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub last_heartbeat: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub nodes: Vec<WsNode>,
    #[serde(default)]
    pub performance_overview: Option<Value>,
}

/// `real_time_update` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimeUpdate {
    #[serde(default)]
    pub data: UpdatePayload,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    ConnectionEstablished { message: Option<String> },
    SignatureMessage { message: Option<String> },
    AuthSuccess { wallet_address: Option<String> },
    AuthFailed { code: String, message: String },
    MonitoringStarted,
    MonitoringStopped,
    RealTimeUpdate(RealTimeUpdate),
    Pong { timestamp: Option<i64> },
    Error { code: Option<String>, message: String },
    /// Terminal and remote-command sub-protocol, handed to the caller as is.
    PassThrough { frame_type: String, payload: Value },
    Unknown { frame_type: String },
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct AuthSuccessBody {
    #[serde(default)]
    wallet_address: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error_code")]
    code: Option<String>,
    #[serde(default, alias = "error")]
    message: Option<String>,
}

#[derive(Deserialize)]
struct PongBody {
    #[serde(default)]
    timestamp: Option<i64>,
}

impl ServerFrame {
    pub fn parse(text: &str) -> WsResult<(Self, Value)> {
        let value: Value = serde_json::from_str(text)?;
        let frame = Self::from_value(&value)?;
        Ok((frame, value))
    }

    pub fn from_value(value: &Value) -> WsResult<Self> {
        let frame_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| WsError::InvalidFrame("missing type".to_string()))?;

        let frame = match frame_type {
            "connection_established" => Self::ConnectionEstablished {
                message: body::<MessageBody>(value)?.message,
            },
            "signature_message" => Self::SignatureMessage {
                message: body::<MessageBody>(value)?.message,
            },
            "auth_success" => Self::AuthSuccess {
                wallet_address: body::<AuthSuccessBody>(value)?.wallet_address,
            },
            "auth_failed" => {
                let b = body::<ErrorBody>(value)?;
                Self::AuthFailed {
                    code: b.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                    message: b.message.unwrap_or_default(),
                }
            }
            "monitoring_started" => Self::MonitoringStarted,
            "monitoring_stopped" => Self::MonitoringStopped,
            "real_time_update" => Self::RealTimeUpdate(body(value)?),
            "pong" => Self::Pong {
                timestamp: body::<PongBody>(value)?.timestamp,
            },
            "error" => {
                let b = body::<ErrorBody>(value)?;
                Self::Error {
                    code: b.code,
                    message: b.message.unwrap_or_default(),
                }
            }
            t if is_pass_through(t) => Self::PassThrough {
                frame_type: t.to_string(),
                payload: value.clone(),
            },
            t => Self::Unknown {
                frame_type: t.to_string(),
            },
        };
        Ok(frame)
    }

    /// Tag used for logs and metric labels.
    pub fn type_name(&self) -> &str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::SignatureMessage { .. } => "signature_message",
            Self::AuthSuccess { .. } => "auth_success",
            Self::AuthFailed { .. } => "auth_failed",
            Self::MonitoringStarted => "monitoring_started",
            Self::MonitoringStopped => "monitoring_stopped",
            Self::RealTimeUpdate(_) => "real_time_update",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
            Self::PassThrough { .. } => "pass_through",
            Self::Unknown { .. } => "unknown",
        }
    }
}

fn body<T: serde::de::DeserializeOwned>(value: &Value) -> WsResult<T> {
    T::deserialize(value).map_err(|e| WsError::InvalidFrame(e.to_string()))
}

/// `term_*`, `remote_auth*` and `remote_command*` frames.
pub fn is_pass_through(frame_type: &str) -> bool {
    frame_type.starts_with("term_")
        || frame_type.starts_with("remote_auth")
        || frame_type.starts_with("remote_command")
}

/// Auth failure codes that a fresh signature can fix.
pub fn is_recoverable_auth_code(code: &str) -> bool {
    let code = code.to_ascii_lowercase();
    code.contains("expired") || code.contains("invalid_signature")
}
