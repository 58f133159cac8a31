//! Types shared by the RPC transports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur on the RPC channel to the daemon.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Daemon client used before connect or after close")]
    NotConnected,

    #[error("Connection to daemon closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,

    #[error("Daemon error {code}: {message}")]
    Daemon { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// True when the transport itself is unusable, as opposed to a single
    /// call being rejected.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectionFailed(_)
                | RpcError::NotConnected
                | RpcError::ConnectionClosed
                | RpcError::Timeout
        )
    }

    pub(crate) fn daemon(code: i64, message: impl Into<String>) -> Self {
        RpcError::Daemon {
            code,
            message: message.into(),
        }
    }
}

/// Kind of a notification pushed by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonEventKind {
    DownloadStart,
    DownloadPause,
    DownloadStop,
    DownloadComplete,
    DownloadError,
    BtDownloadComplete,
}

impl DaemonEventKind {
    /// Map a notification method name to its kind.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "aria2.onDownloadStart" => Some(DaemonEventKind::DownloadStart),
            "aria2.onDownloadPause" => Some(DaemonEventKind::DownloadPause),
            "aria2.onDownloadStop" => Some(DaemonEventKind::DownloadStop),
            "aria2.onDownloadComplete" => Some(DaemonEventKind::DownloadComplete),
            "aria2.onDownloadError" => Some(DaemonEventKind::DownloadError),
            "aria2.onBtDownloadComplete" => Some(DaemonEventKind::BtDownloadComplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonEventKind::DownloadStart => "download_start",
            DaemonEventKind::DownloadPause => "download_pause",
            DaemonEventKind::DownloadStop => "download_stop",
            DaemonEventKind::DownloadComplete => "download_complete",
            DaemonEventKind::DownloadError => "download_error",
            DaemonEventKind::BtDownloadComplete => "bt_download_complete",
        }
    }
}

/// A notification pushed by the daemon about one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonEvent {
    pub kind: DaemonEventKind,
    /// Daemon id of the task the event refers to.
    pub gid: String,
    pub received_at: DateTime<Utc>,
}

/// A request/response channel to the daemon.
///
/// Implementations correlate each response with its request. They never
/// reconnect on their own: once the underlying connection is lost every
/// further call fails with a connection error.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Issue one call and wait for its result.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;

    /// Close the connection. Pending calls fail with `ConnectionClosed`.
    async fn close(&self);

    /// Subscribe to daemon notifications, if this transport carries them.
    fn subscribe(&self) -> Option<broadcast::Receiver<DaemonEvent>> {
        None
    }
}
