//! Mock download daemon for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::daemon::{DownloadDaemon, GlobalSpeed, OptionMap};
use crate::rpc::{DaemonEvent, DaemonEventKind, RpcError};
use crate::task::{TaskDescriptor, TaskStatus};

/// One call made against the mock, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCall {
    Version,
    ListActive,
    ListWaiting { offset: u32, limit: u32 },
    ForceRemove(String),
    RemoveResult(String),
    PurgeResults,
    ForcePauseAll,
    GlobalStats,
    ChangeTaskOption { gid: String, options: Vec<(String, String)> },
    ChangeGlobalOption(Vec<(String, String)>),
    GlobalOptions,
}

impl DaemonCall {
    /// aria2 method name without the `aria2.` prefix.
    pub fn method(&self) -> &'static str {
        match self {
            DaemonCall::Version => "getVersion",
            DaemonCall::ListActive => "tellActive",
            DaemonCall::ListWaiting { .. } => "tellWaiting",
            DaemonCall::ForceRemove(_) => "forceRemove",
            DaemonCall::RemoveResult(_) => "removeDownloadResult",
            DaemonCall::PurgeResults => "purgeDownloadResult",
            DaemonCall::ForcePauseAll => "forcePauseAll",
            DaemonCall::GlobalStats => "getGlobalStat",
            DaemonCall::ChangeTaskOption { .. } => "changeOption",
            DaemonCall::ChangeGlobalOption(_) => "changeGlobalOption",
            DaemonCall::GlobalOptions => "getGlobalOption",
        }
    }

    fn gid(&self) -> Option<&str> {
        match self {
            DaemonCall::ForceRemove(gid)
            | DaemonCall::RemoveResult(gid)
            | DaemonCall::ChangeTaskOption { gid, .. } => Some(gid),
            _ => None,
        }
    }
}

/// A recorded call with the time it was made.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: DaemonCall,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the DownloadDaemon trait.
///
/// Emulates the list semantics of aria2: `list_active` returns active
/// tasks, `list_waiting` returns waiting and paused tasks in insertion
/// order. Stopped tasks (complete, error, removed) only show up through
/// `list_waiting` when `set_waiting_includes_stopped(true)` is set.
///
/// Failures can be injected per method, per gid, and per global option key.
/// After `close` every call fails with `NotConnected` until `reconnect`.
///
/// # Example
///
/// ```rust,ignore
/// let daemon = Arc::new(MockDaemon::new());
/// daemon.add_task(fixtures::active_task("a1")).await;
/// daemon.fail_gid("a1").await;
///
/// let orchestrator = Orchestrator::new(daemon.clone(), OrchestratorConfig::default());
/// let report = orchestrator.remove_all().await?;
/// assert_eq!(report.failures.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockDaemon {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    tasks: Arc<RwLock<Vec<TaskDescriptor>>>,
    global_options: Arc<RwLock<HashMap<String, String>>>,
    failing_methods: Arc<RwLock<HashSet<String>>>,
    stalled_methods: Arc<RwLock<HashSet<String>>>,
    failing_gids: Arc<RwLock<HashSet<String>>>,
    rejected_global_keys: Arc<RwLock<HashSet<String>>>,
    waiting_includes_stopped: AtomicBool,
    connected: AtomicBool,
    events: broadcast::Sender<DaemonEvent>,
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDaemon {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            tasks: Arc::new(RwLock::new(Vec::new())),
            global_options: Arc::new(RwLock::new(HashMap::new())),
            failing_methods: Arc::new(RwLock::new(HashSet::new())),
            stalled_methods: Arc::new(RwLock::new(HashSet::new())),
            failing_gids: Arc::new(RwLock::new(HashSet::new())),
            rejected_global_keys: Arc::new(RwLock::new(HashSet::new())),
            waiting_includes_stopped: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            events,
        }
    }

    /// Calls made so far, oldest first.
    pub async fn calls(&self) -> Vec<DaemonCall> {
        self.calls
            .read()
            .await
            .iter()
            .map(|recorded| recorded.call.clone())
            .collect()
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Calls of one aria2 method (e.g. `"forceRemove"`).
    pub async fn calls_to(&self, method: &str) -> Vec<DaemonCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| call.method() == method)
            .collect()
    }

    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Append a task to the daemon's queue.
    pub async fn add_task(&self, task: TaskDescriptor) {
        self.tasks.write().await.push(task);
    }

    /// Swap one task for another in place, as aria2 does when a magnet's
    /// metadata resolves into a new download.
    pub async fn replace_task(&self, gid: &str, replacement: TaskDescriptor) {
        let mut tasks = self.tasks.write().await;
        if let Some(slot) = tasks.iter_mut().find(|t| t.gid == gid) {
            *slot = replacement;
        }
    }

    pub async fn task(&self, gid: &str) -> Option<TaskDescriptor> {
        self.tasks.read().await.iter().find(|t| t.gid == gid).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn set_status(&self, gid: &str, status: TaskStatus) {
        if let Some(task) = self.tasks.write().await.iter_mut().find(|t| t.gid == gid) {
            task.status = status;
        }
    }

    /// Set the download/upload speeds for a task.
    pub async fn set_speeds(&self, gid: &str, download: u64, upload: u64) {
        if let Some(task) = self.tasks.write().await.iter_mut().find(|t| t.gid == gid) {
            task.download_speed = download;
            task.upload_speed = upload;
        }
    }

    pub async fn set_waiting_includes_stopped(&self, include: bool) {
        self.waiting_includes_stopped.store(include, Ordering::SeqCst);
    }

    /// Seed a global default without recording a call.
    pub async fn set_global_option(&self, key: &str, value: &str) {
        self.global_options
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    /// Global defaults as the daemon currently holds them.
    pub async fn daemon_global_options(&self) -> HashMap<String, String> {
        self.global_options.read().await.clone()
    }

    /// Make every call of an aria2 method fail (e.g. `"tellWaiting"`).
    pub async fn fail_method(&self, method: &str) {
        self.failing_methods.write().await.insert(method.to_string());
    }

    /// Make every call of an aria2 method hang without ever answering.
    pub async fn stall_method(&self, method: &str) {
        self.stalled_methods.write().await.insert(method.to_string());
    }

    /// Make every call addressing `gid` fail.
    pub async fn fail_gid(&self, gid: &str) {
        self.failing_gids.write().await.insert(gid.to_string());
    }

    /// Make global writes containing `key` fail.
    pub async fn reject_global_key(&self, key: &str) {
        self.rejected_global_keys
            .write()
            .await
            .insert(key.to_string());
    }

    /// Clear all injected failures.
    pub async fn clear_failures(&self) {
        self.failing_methods.write().await.clear();
        self.stalled_methods.write().await.clear();
        self.failing_gids.write().await.clear();
        self.rejected_global_keys.write().await.clear();
    }

    /// Push a notification to subscribers.
    pub fn emit(&self, kind: DaemonEventKind, gid: &str) {
        let _ = self.events.send(DaemonEvent {
            kind,
            gid: gid.to_string(),
            received_at: Utc::now(),
        });
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Record the call, then apply connection state and injected failures.
    async fn enter(&self, call: DaemonCall) -> Result<(), RpcError> {
        let method = call.method();
        let gid = call.gid().map(str::to_string);
        self.calls.write().await.push(RecordedCall {
            call,
            timestamp: Utc::now(),
        });

        if !self.is_connected() {
            return Err(RpcError::NotConnected);
        }
        if self.stalled_methods.read().await.contains(method) {
            std::future::pending::<()>().await;
        }
        if self.failing_methods.read().await.contains(method) {
            return Err(RpcError::daemon(1, format!("{} failed", method)));
        }
        if let Some(gid) = gid {
            if self.failing_gids.read().await.contains(&gid) {
                return Err(RpcError::daemon(1, format!("{} failed for {}", method, gid)));
            }
        }
        Ok(())
    }

    fn gid_not_found(gid: &str) -> RpcError {
        RpcError::daemon(1, format!("GID {} is not found", gid))
    }
}

fn sorted_pairs(options: &OptionMap) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = options
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    pairs.sort();
    pairs
}

#[async_trait]
impl DownloadDaemon for MockDaemon {
    fn name(&self) -> &str {
        "mock"
    }

    async fn version(&self) -> Result<String, RpcError> {
        self.enter(DaemonCall::Version).await?;
        Ok("1.37.0-mock".to_string())
    }

    async fn list_active(&self) -> Result<Vec<TaskDescriptor>, RpcError> {
        self.enter(DaemonCall::ListActive).await?;
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.status == TaskStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_waiting(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<TaskDescriptor>, RpcError> {
        self.enter(DaemonCall::ListWaiting { offset, limit }).await?;
        let include_stopped = self.waiting_includes_stopped.load(Ordering::SeqCst);
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| match t.status {
                TaskStatus::Waiting | TaskStatus::Paused => true,
                TaskStatus::Active => false,
                _ => include_stopped,
            })
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn force_remove(&self, gid: &str) -> Result<(), RpcError> {
        self.enter(DaemonCall::ForceRemove(gid.to_string())).await?;
        let mut tasks = self.tasks.write().await;
        match tasks.iter().position(|t| t.gid == gid && t.status.is_live()) {
            Some(index) => {
                tasks.remove(index);
                Ok(())
            }
            None => Err(Self::gid_not_found(gid)),
        }
    }

    async fn remove_result(&self, gid: &str) -> Result<(), RpcError> {
        self.enter(DaemonCall::RemoveResult(gid.to_string())).await?;
        let mut tasks = self.tasks.write().await;
        match tasks.iter().position(|t| t.gid == gid && !t.status.is_live()) {
            Some(index) => {
                tasks.remove(index);
                Ok(())
            }
            None => Err(Self::gid_not_found(gid)),
        }
    }

    async fn purge_results(&self) -> Result<(), RpcError> {
        self.enter(DaemonCall::PurgeResults).await?;
        self.tasks.write().await.retain(|t| t.status.is_live());
        Ok(())
    }

    async fn force_pause_all(&self) -> Result<(), RpcError> {
        self.enter(DaemonCall::ForcePauseAll).await?;
        for task in self.tasks.write().await.iter_mut() {
            if matches!(task.status, TaskStatus::Active | TaskStatus::Waiting) {
                task.status = TaskStatus::Paused;
                task.download_speed = 0;
                task.upload_speed = 0;
            }
        }
        Ok(())
    }

    async fn global_stats(&self) -> Result<GlobalSpeed, RpcError> {
        self.enter(DaemonCall::GlobalStats).await?;
        let tasks = self.tasks.read().await;
        Ok(GlobalSpeed {
            download_speed: tasks.iter().map(|t| t.download_speed).sum(),
            upload_speed: tasks.iter().map(|t| t.upload_speed).sum(),
        })
    }

    async fn change_task_option(&self, gid: &str, options: &OptionMap) -> Result<(), RpcError> {
        self.enter(DaemonCall::ChangeTaskOption {
            gid: gid.to_string(),
            options: sorted_pairs(options),
        })
        .await?;
        let tasks = self.tasks.read().await;
        if tasks.iter().any(|t| t.gid == gid && t.status.is_live()) {
            Ok(())
        } else {
            Err(Self::gid_not_found(gid))
        }
    }

    async fn change_global_option(&self, options: &OptionMap) -> Result<(), RpcError> {
        self.enter(DaemonCall::ChangeGlobalOption(sorted_pairs(options)))
            .await?;
        {
            let rejected = self.rejected_global_keys.read().await;
            if let Some(key) = options.keys().find(|k| rejected.contains(*k)) {
                return Err(RpcError::daemon(1, format!("Option {} is rejected", key)));
            }
        }
        self.global_options
            .write()
            .await
            .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn global_options(&self) -> Result<OptionMap, RpcError> {
        self.enter(DaemonCall::GlobalOptions).await?;
        Ok(self.global_options.read().await.clone())
    }

    async fn subscribe(&self) -> Option<broadcast::Receiver<DaemonEvent>> {
        Some(self.events.subscribe())
    }

    async fn reconnect(&self) -> Result<(), RpcError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_semantics() {
        let daemon = MockDaemon::new();
        daemon.add_task(fixtures::waiting_task("w1")).await;
        daemon.add_task(fixtures::active_task("a1")).await;
        daemon.add_task(fixtures::complete_task("c1")).await;

        let active = daemon.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].gid, "a1");

        let waiting = daemon.list_waiting(0, 10).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].gid, "w1");

        daemon.set_waiting_includes_stopped(true).await;
        assert_eq!(daemon.list_waiting(0, 10).await.unwrap().len(), 2);
        assert_eq!(daemon.list_waiting(0, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_force_remove_unknown_gid_fails() {
        let daemon = MockDaemon::new();
        let err = daemon.force_remove("nope").await.unwrap_err();
        assert!(matches!(err, RpcError::Daemon { code: 1, .. }));
        assert_eq!(daemon.calls_to("forceRemove").await.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_method() {
        let daemon = MockDaemon::new();
        daemon.fail_method("getGlobalStat").await;
        assert!(daemon.global_stats().await.is_err());
        assert!(daemon.list_active().await.is_ok());

        daemon.clear_failures().await;
        assert!(daemon.global_stats().await.is_ok());
    }

    #[tokio::test]
    async fn test_stall_method() {
        let daemon = MockDaemon::new();
        daemon.stall_method("getGlobalStat").await;
        let stalled =
            tokio::time::timeout(std::time::Duration::from_millis(50), daemon.global_stats()).await;
        assert!(stalled.is_err());
        assert!(daemon.list_active().await.is_ok());

        daemon.clear_failures().await;
        assert!(daemon.global_stats().await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_all_pauses_live_tasks() {
        let daemon = MockDaemon::new();
        daemon.add_task(fixtures::active_task("a1")).await;
        daemon.add_task(fixtures::complete_task("c1")).await;

        daemon.force_pause_all().await.unwrap();
        assert_eq!(daemon.task("a1").await.unwrap().status, TaskStatus::Paused);
        assert_eq!(daemon.task("c1").await.unwrap().status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn test_close_and_reconnect() {
        let daemon = MockDaemon::new();
        daemon.close().await;
        assert!(matches!(
            daemon.version().await,
            Err(RpcError::NotConnected)
        ));

        daemon.reconnect().await.unwrap();
        assert!(daemon.version().await.is_ok());
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let daemon = MockDaemon::new();
        let mut rx = daemon.subscribe().await.unwrap();
        daemon.emit(DaemonEventKind::DownloadComplete, "a1");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, DaemonEventKind::DownloadComplete);
        assert_eq!(event.gid, "a1");
    }
}
