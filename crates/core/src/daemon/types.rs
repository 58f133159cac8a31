//! Typed RPC surface of the download daemon.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::rpc::{DaemonEvent, RpcError};
use crate::task::TaskDescriptor;

/// Aggregate throughput across every task the daemon is serving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSpeed {
    /// Bytes/second.
    pub download_speed: u64,
    /// Bytes/second.
    pub upload_speed: u64,
}

/// Daemon option changes, key → value.
pub type OptionMap = HashMap<String, String>;

/// Operations the orchestration layer needs from the daemon.
///
/// Each method is one daemon call. A rejected call is an `RpcError::Daemon`,
/// distinguishable from a successful empty result.
#[async_trait]
pub trait DownloadDaemon: Send + Sync {
    /// Get the daemon name for logging.
    fn name(&self) -> &str;

    /// Daemon version string.
    async fn version(&self) -> Result<String, RpcError>;

    /// Tasks currently transferring.
    async fn list_active(&self) -> Result<Vec<TaskDescriptor>, RpcError>;

    /// Waiting and paused tasks, in queue order.
    async fn list_waiting(&self, offset: u32, limit: u32)
        -> Result<Vec<TaskDescriptor>, RpcError>;

    /// Stop and remove a task regardless of its progress.
    async fn force_remove(&self, gid: &str) -> Result<(), RpcError>;

    /// Drop the result record of a finished task.
    async fn remove_result(&self, gid: &str) -> Result<(), RpcError>;

    /// Drop every complete/error/removed result record.
    async fn purge_results(&self) -> Result<(), RpcError>;

    /// Pause every task without waiting for peers to be notified.
    async fn force_pause_all(&self) -> Result<(), RpcError>;

    /// Aggregate throughput.
    async fn global_stats(&self) -> Result<GlobalSpeed, RpcError>;

    /// Change options of one live task.
    async fn change_task_option(&self, gid: &str, options: &OptionMap) -> Result<(), RpcError>;

    /// Change global defaults applied to future tasks.
    async fn change_global_option(&self, options: &OptionMap) -> Result<(), RpcError>;

    /// Current global defaults.
    async fn global_options(&self) -> Result<OptionMap, RpcError>;

    /// Daemon notifications, if the connection carries them.
    async fn subscribe(&self) -> Option<broadcast::Receiver<DaemonEvent>>;

    /// Drop the current connection and open a new one. No call is issued
    /// while this runs.
    async fn reconnect(&self) -> Result<(), RpcError>;

    /// Close the connection. Later calls fail with `NotConnected`.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_speed_serialization() {
        let speed = GlobalSpeed {
            download_speed: 1024,
            upload_speed: 0,
        };
        let json = serde_json::to_string(&speed).unwrap();
        assert_eq!(json, r#"{"download_speed":1024,"upload_speed":0}"#);
    }
}
