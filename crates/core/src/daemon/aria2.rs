//! aria2 daemon client over JSON-RPC.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::metrics::{RPC_CALLS, RPC_DURATION};
use crate::rpc::{connect_transport, DaemonEvent, RpcError, RpcTransport};
use crate::task::{BittorrentInfo, TaskDescriptor, TaskFile, TaskStatus};

use super::{DownloadDaemon, GlobalSpeed, OptionMap};

/// aria2 client.
///
/// Each call takes its own handle on the current transport. `reconnect`
/// and `close` swap the slot exclusively and close the old transport,
/// which fails whatever calls are still pending on it.
pub struct Aria2Client {
    config: DaemonConfig,
    transport: RwLock<Option<Arc<dyn RpcTransport>>>,
}

impl Aria2Client {
    /// Connect to the daemon and verify the session with a version probe.
    pub async fn connect(config: DaemonConfig) -> Result<Self, RpcError> {
        let transport = connect_transport(&config).await?;
        let transport_name = transport.name().to_string();
        let client = Self::with_transport(config, transport);

        match client.version().await {
            Ok(version) => {
                info!(
                    version = %version,
                    transport = %transport_name,
                    endpoint = %client.config.endpoint,
                    "Connected to aria2"
                );
                Ok(client)
            }
            Err(e) => {
                client.close().await;
                Err(match e {
                    e if e.is_connection_error() => e,
                    other => RpcError::ConnectionFailed(format!(
                        "Daemon rejected the session: {}",
                        other
                    )),
                })
            }
        }
    }

    /// Wrap an already open transport.
    pub fn with_transport(config: DaemonConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            transport: RwLock::new(Some(transport)),
        }
    }

    /// Prepend the secret token when one is configured.
    fn params(&self, args: Vec<Value>) -> Vec<Value> {
        match self.config.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => {
                let mut params = Vec::with_capacity(args.len() + 1);
                params.push(Value::String(format!("token:{}", secret)));
                params.extend(args);
                params
            }
            None => args,
        }
    }

    /// Issue one call and decode its result.
    async fn call<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<T, RpcError> {
        // Cloned out of the slot so a hung call never blocks close or reconnect.
        let transport = self.transport.read().await.clone();
        let transport = match transport {
            Some(transport) => transport,
            None => {
                error!(method, "aria2 call issued without an open connection");
                return Err(RpcError::NotConnected);
            }
        };

        let started = Instant::now();
        let result = transport.call(method, self.params(args)).await;
        RPC_DURATION
            .with_label_values(&[method])
            .observe(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "ok",
            Err(RpcError::Daemon { .. }) => "daemon_error",
            Err(e) if e.is_connection_error() => "connection_error",
            Err(_) => "invalid",
        };
        RPC_CALLS.with_label_values(&[method, outcome]).inc();

        let value = result.inspect_err(|e| debug!(method, "aria2 call failed: {}", e))?;
        serde_json::from_value(value).map_err(|e| {
            RpcError::InvalidResponse(format!("Failed to decode {} result: {}", method, e))
        })
    }

    async fn call_ok(&self, method: &str, args: Vec<Value>) -> Result<(), RpcError> {
        self.call::<Value>(method, args).await.map(|_| ())
    }

    async fn tell(&self, method: &str, args: Vec<Value>) -> Result<Vec<TaskDescriptor>, RpcError> {
        let statuses: Vec<Aria2Status> = self.call(method, args).await?;
        statuses
            .into_iter()
            .map(Aria2Status::into_descriptor)
            .collect()
    }
}

/// aria2 task status record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Aria2Status {
    gid: String,
    status: TaskStatus,
    #[serde(default)]
    dir: String,
    #[serde(default)]
    files: Vec<Aria2File>,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    upload_speed: String,
    #[serde(default)]
    info_hash: Option<String>,
    #[serde(default)]
    bittorrent: Option<Aria2Bittorrent>,
    #[serde(default)]
    following: Option<String>,
    #[serde(default)]
    followed_by: Vec<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Aria2File {
    path: String,
    #[serde(default)]
    length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    selected: String,
}

#[derive(Debug, Deserialize)]
struct Aria2Bittorrent {
    #[serde(default)]
    info: Option<Aria2BittorrentInfo>,
}

#[derive(Debug, Deserialize)]
struct Aria2BittorrentInfo {
    #[serde(default)]
    name: Option<String>,
}

impl Aria2Status {
    fn into_descriptor(self) -> Result<TaskDescriptor, RpcError> {
        let files = self
            .files
            .into_iter()
            .map(|f| {
                Ok(TaskFile {
                    length: parse_count("length", &f.length)?,
                    completed_length: parse_count("completedLength", &f.completed_length)?,
                    // aria2 omits "selected" for some download types; treat as selected.
                    selected: f.selected != "false",
                    path: f.path,
                })
            })
            .collect::<Result<Vec<_>, RpcError>>()?;

        let info_hash = self.info_hash.filter(|h| !h.is_empty());
        let bittorrent = self.bittorrent.map(|bt| BittorrentInfo {
            name: bt.info.and_then(|info| info.name),
            info_hash: info_hash.clone(),
        });

        Ok(TaskDescriptor {
            gid: self.gid,
            status: self.status,
            dir: self.dir,
            files,
            total_length: parse_count("totalLength", &self.total_length)?,
            completed_length: parse_count("completedLength", &self.completed_length)?,
            download_speed: parse_count("downloadSpeed", &self.download_speed)?,
            upload_speed: parse_count("uploadSpeed", &self.upload_speed)?,
            bittorrent,
            following: self.following.filter(|g| !g.is_empty()),
            followed_by: self.followed_by,
            error_message: self.error_message.filter(|m| !m.is_empty()),
        })
    }
}

/// aria2 global statistics record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Aria2GlobalStat {
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    upload_speed: String,
}

impl Aria2GlobalStat {
    fn into_speed(self) -> Result<GlobalSpeed, RpcError> {
        Ok(GlobalSpeed {
            download_speed: parse_count("downloadSpeed", &self.download_speed)?,
            upload_speed: parse_count("uploadSpeed", &self.upload_speed)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Aria2Version {
    version: String,
}

/// aria2 sends integers as decimal strings. Absent or empty means 0.
fn parse_count(field: &str, raw: &str) -> Result<u64, RpcError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| {
        RpcError::InvalidResponse(format!("{} is not a number: {:?}", field, raw))
    })
}

#[async_trait]
impl DownloadDaemon for Aria2Client {
    fn name(&self) -> &str {
        "aria2"
    }

    async fn version(&self) -> Result<String, RpcError> {
        let version: Aria2Version = self.call("aria2.getVersion", vec![]).await?;
        Ok(version.version)
    }

    async fn list_active(&self) -> Result<Vec<TaskDescriptor>, RpcError> {
        self.tell("aria2.tellActive", vec![]).await
    }

    async fn list_waiting(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<TaskDescriptor>, RpcError> {
        self.tell("aria2.tellWaiting", vec![json!(offset), json!(limit)])
            .await
    }

    async fn force_remove(&self, gid: &str) -> Result<(), RpcError> {
        self.call_ok("aria2.forceRemove", vec![json!(gid)]).await
    }

    async fn remove_result(&self, gid: &str) -> Result<(), RpcError> {
        self.call_ok("aria2.removeDownloadResult", vec![json!(gid)])
            .await
    }

    async fn purge_results(&self) -> Result<(), RpcError> {
        self.call_ok("aria2.purgeDownloadResult", vec![]).await
    }

    async fn force_pause_all(&self) -> Result<(), RpcError> {
        self.call_ok("aria2.forcePauseAll", vec![]).await
    }

    async fn global_stats(&self) -> Result<GlobalSpeed, RpcError> {
        let stat: Aria2GlobalStat = self.call("aria2.getGlobalStat", vec![]).await?;
        stat.into_speed()
    }

    async fn change_task_option(&self, gid: &str, options: &OptionMap) -> Result<(), RpcError> {
        self.call_ok("aria2.changeOption", vec![json!(gid), json!(options)])
            .await
    }

    async fn change_global_option(&self, options: &OptionMap) -> Result<(), RpcError> {
        self.call_ok("aria2.changeGlobalOption", vec![json!(options)])
            .await
    }

    async fn global_options(&self) -> Result<OptionMap, RpcError> {
        self.call("aria2.getGlobalOption", vec![]).await
    }

    async fn subscribe(&self) -> Option<broadcast::Receiver<DaemonEvent>> {
        self.transport
            .read()
            .await
            .as_ref()
            .and_then(|transport| transport.subscribe())
    }

    async fn reconnect(&self) -> Result<(), RpcError> {
        let mut slot = self.transport.write().await;
        if let Some(old) = slot.take() {
            old.close().await;
        }
        warn!(endpoint = %self.config.endpoint, "Reconnecting to aria2");
        let transport = connect_transport(&self.config).await?;
        *slot = Some(transport);
        info!(endpoint = %self.config.endpoint, "Reconnected to aria2");
        Ok(())
    }

    async fn close(&self) {
        let mut slot = self.transport.write().await;
        if let Some(transport) = slot.take() {
            transport.close().await;
            info!(endpoint = %self.config.endpoint, "Closed aria2 connection");
        }
    }
}
