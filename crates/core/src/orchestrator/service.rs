//! The orchestration facade over one daemon connection.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::daemon::{Aria2Client, DownloadDaemon, GlobalSpeed, OptionMap};
use crate::metrics::BATCH_FAILURES;
use crate::options::{GlobalOptionCache, OptionScope};
use crate::rpc::{DaemonEvent, RpcError};
use crate::task::{TaskDescriptor, TaskStatus, TaskTracker};

use super::config::OrchestratorConfig;
use super::types::{BatchReport, GlobalWrite, OptionChangeReport, OrchestratorError};

/// Bulk operations over every task the daemon knows about.
///
/// Owns the daemon client, the global option cache and the task tracker.
/// The entry point creates one at startup and closes it on shutdown.
pub struct Orchestrator {
    daemon: Arc<dyn DownloadDaemon>,
    config: OrchestratorConfig,
    options: GlobalOptionCache,
    tracker: TaskTracker,
}

impl Orchestrator {
    pub fn new(daemon: Arc<dyn DownloadDaemon>, config: OrchestratorConfig) -> Self {
        Self {
            daemon,
            config,
            options: GlobalOptionCache::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Connect to the configured aria2 daemon.
    pub async fn connect(config: &Config) -> Result<Self, OrchestratorError> {
        let client = Aria2Client::connect(config.daemon.clone())
            .await
            .map_err(OrchestratorError::Connection)?;
        Ok(Self::new(Arc::new(client), config.orchestrator.clone()))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Correlation tokens for tasks whose gid may be replaced.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Active tasks followed by up to `limit` waiting tasks.
    ///
    /// Both lists are requested concurrently; either failing fails the whole
    /// enumeration.
    pub async fn list_active_and_waiting(
        &self,
        limit: u32,
    ) -> Result<Vec<TaskDescriptor>, OrchestratorError> {
        let (mut tasks, waiting) = tokio::try_join!(
            self.daemon.list_active(),
            self.daemon.list_waiting(0, limit)
        )?;
        tasks.extend(waiting);

        self.tracker.refresh(&tasks).await;
        debug!(count = tasks.len(), "Enumerated tasks");
        Ok(tasks)
    }

    /// Find a live task by gid, paging through the whole waiting queue.
    pub async fn find_live_task(
        &self,
        gid: &str,
    ) -> Result<Option<TaskDescriptor>, OrchestratorError> {
        if let Some(task) = self
            .daemon
            .list_active()
            .await?
            .into_iter()
            .find(|task| task.gid == gid)
        {
            return Ok(Some(task));
        }

        let page = self.config.waiting_limit.max(1);
        let mut offset = 0;
        loop {
            let waiting = self.daemon.list_waiting(offset, page).await?;
            let fetched = waiting.len();
            if let Some(task) = waiting.into_iter().find(|task| task.gid == gid) {
                return Ok(Some(task));
            }
            if fetched < page as usize {
                return Ok(None);
            }
            offset += page;
        }
    }

    /// Remove one task the way its status requires.
    ///
    /// Live tasks are force-removed and errors propagate. For finished
    /// tasks only the result record is dropped, and a failure there is
    /// ignored.
    pub async fn remove_one(&self, task: &TaskDescriptor) -> Result<(), OrchestratorError> {
        if task.status.is_live() {
            self.daemon.force_remove(&task.gid).await?;
            info!(gid = %task.gid, status = task.status.as_str(), "Removed task");
        } else if let Err(e) = self.daemon.remove_result(&task.gid).await {
            debug!(gid = %task.gid, "Ignoring failed result removal: {}", e);
        }
        Ok(())
    }

    /// Pause everything, purge finished results, then force-remove every
    /// remaining task.
    pub async fn remove_all(&self) -> Result<BatchReport, OrchestratorError> {
        self.daemon.force_pause_all().await?;
        self.daemon.purge_results().await?;

        let tasks = self.list_active_and_waiting(self.config.waiting_limit).await?;
        let results = join_all(tasks.iter().map(|task| self.daemon.force_remove(&task.gid))).await;

        let report = self.collect("remove_all", &tasks, results);
        info!(
            removed = report.succeeded.len(),
            failed = report.failures.len(),
            "Removed all tasks"
        );
        Ok(report)
    }

    /// Apply `key = value` to every unfinished task and, unless the key only
    /// exists per task, as the global default for new tasks.
    pub async fn change_option(
        &self,
        key: &str,
        value: &str,
    ) -> Result<OptionChangeReport, OrchestratorError> {
        let tasks: Vec<TaskDescriptor> = self
            .list_active_and_waiting(self.config.waiting_limit)
            .await?
            .into_iter()
            .filter(|task| task.status != TaskStatus::Complete)
            .collect();

        let options: OptionMap = HashMap::from([(key.to_string(), value.to_string())]);
        let results = join_all(
            tasks
                .iter()
                .map(|task| self.daemon.change_task_option(&task.gid, &options)),
        )
        .await;
        let report = self.collect("change_option", &tasks, results);

        let global = match OptionScope::of(key) {
            OptionScope::TaskOnly => GlobalWrite::Skipped,
            OptionScope::GlobalAndTask => {
                self.options
                    .write_through(key, value, || self.daemon.change_global_option(&options))
                    .await
                    .map_err(|e| self.global_write_error(key, e))?;
                GlobalWrite::Applied
            }
        };

        info!(
            key,
            value,
            tasks = report.succeeded.len(),
            failed = report.failures.len(),
            global = ?global,
            "Changed option"
        );
        Ok(OptionChangeReport {
            tasks: report,
            global,
        })
    }

    fn global_write_error(&self, key: &str, err: RpcError) -> OrchestratorError {
        if err.is_connection_error() {
            return OrchestratorError::Connection(err);
        }
        warn!(key, "Global default rejected after task options changed: {}", err);
        OrchestratorError::InvariantViolation {
            key: key.to_string(),
            source: err,
        }
    }

    /// Aggregate download and upload speed.
    pub async fn overall_speed(&self) -> Result<GlobalSpeed, OrchestratorError> {
        Ok(self.daemon.global_stats().await?)
    }

    pub async fn pause_all(&self) -> Result<(), OrchestratorError> {
        self.daemon.force_pause_all().await?;
        info!("Paused all tasks");
        Ok(())
    }

    /// Reload the option cache from the daemon.
    pub async fn sync_global_options(&self) -> Result<usize, OrchestratorError> {
        let count = self
            .options
            .replace_from(|| self.daemon.global_options())
            .await?;
        debug!(count, "Synced global options");
        Ok(count)
    }

    /// Cached global default for `key`.
    pub async fn global_option(&self, key: &str) -> Option<String> {
        self.options.get(key).await
    }

    pub async fn global_options(&self) -> HashMap<String, String> {
        self.options.snapshot().await
    }

    /// Daemon notifications, when the transport carries them.
    pub async fn subscribe_events(&self) -> Option<broadcast::Receiver<DaemonEvent>> {
        self.daemon.subscribe().await
    }

    pub async fn reconnect(&self) -> Result<(), OrchestratorError> {
        self.daemon
            .reconnect()
            .await
            .map_err(OrchestratorError::Connection)
    }

    pub async fn close(&self) {
        self.daemon.close().await;
        info!(daemon = self.daemon.name(), "Orchestrator closed");
    }

    fn collect(
        &self,
        operation: &str,
        tasks: &[TaskDescriptor],
        results: Vec<Result<(), RpcError>>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (task, result) in tasks.iter().zip(results) {
            if let Err(e) = &result {
                warn!(gid = %task.gid, operation, "Task operation failed: {}", e);
                BATCH_FAILURES.with_label_values(&[operation]).inc();
            }
            report.record(task.gid.clone(), result);
        }
        report
    }
}
