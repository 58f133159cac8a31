//! JSON-RPC 2.0 envelope used by both transports.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DaemonEvent, DaemonEventKind, RpcError};

/// Outgoing request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

impl<'a> RpcRequest<'a> {
    pub(crate) fn new(id: u64, method: &'a str, params: &'a [Value]) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    pub(crate) fn to_json(&self) -> Result<String, RpcError> {
        serde_json::to_string(self)
            .map_err(|e| RpcError::InvalidResponse(format!("Failed to encode request: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Any message the daemon may send: a response or a notification.
#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

/// A decoded incoming message.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response {
        id: u64,
        result: Result<Value, RpcError>,
    },
    Notification(DaemonEvent),
    /// Well-formed but nothing to route (unknown notification, null id).
    Ignored,
}

/// Decode one text frame or HTTP body.
pub(crate) fn parse_incoming(text: &str) -> Result<Incoming, RpcError> {
    let message: RpcMessage = serde_json::from_str(text)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse message: {}", e)))?;

    if let Some(method) = message.method.as_deref() {
        if message.id.is_none() {
            return Ok(parse_notification(method, message.params.as_ref())
                .map(Incoming::Notification)
                .unwrap_or(Incoming::Ignored));
        }
    }

    let id = match message.id.as_ref().and_then(parse_id) {
        Some(id) => id,
        None => return Ok(Incoming::Ignored),
    };

    let result = match (message.error, message.result) {
        (Some(err), _) => Err(RpcError::daemon(err.code, err.message)),
        (None, Some(value)) => Ok(value),
        (None, None) => Err(RpcError::InvalidResponse(
            "Response carries neither result nor error".to_string(),
        )),
    };

    Ok(Incoming::Response { id, result })
}

fn parse_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_notification(method: &str, params: Option<&Value>) -> Option<DaemonEvent> {
    let kind = DaemonEventKind::from_method(method)?;
    let gid = params?
        .as_array()?
        .first()?
        .get("gid")?
        .as_str()?
        .to_string();

    Some(DaemonEvent {
        kind,
        gid,
        received_at: Utc::now(),
    })
}
