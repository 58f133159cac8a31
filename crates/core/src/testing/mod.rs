//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the `DownloadDaemon` trait, allowing the
//! orchestration layer to be exercised without a running aria2.
//!
//! # Example
//!
//! ```rust,ignore
//! use ariaherd_core::testing::{fixtures, MockDaemon};
//!
//! let daemon = Arc::new(MockDaemon::new());
//! daemon.add_task(fixtures::active_task("2089b05ecca3d829")).await;
//! daemon.fail_method("tellWaiting").await;
//!
//! let orchestrator = Orchestrator::new(daemon.clone(), OrchestratorConfig::default());
//! ```

mod mock_daemon;

pub use mock_daemon::{DaemonCall, MockDaemon, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::task::{TaskDescriptor, TaskStatus};

    /// Download directory used by every fixture.
    pub const DOWNLOAD_DIR: &str = "/downloads";

    /// A single-file HTTP-style task with the given status.
    pub fn task(gid: &str, status: TaskStatus) -> TaskDescriptor {
        TaskDescriptor::new(gid, status, DOWNLOAD_DIR)
            .with_file(format!("{}/{}.bin", DOWNLOAD_DIR, gid), 100 * 1024 * 1024)
    }

    pub fn active_task(gid: &str) -> TaskDescriptor {
        task(gid, TaskStatus::Active)
    }

    pub fn waiting_task(gid: &str) -> TaskDescriptor {
        task(gid, TaskStatus::Waiting)
    }

    pub fn paused_task(gid: &str) -> TaskDescriptor {
        task(gid, TaskStatus::Paused)
    }

    pub fn complete_task(gid: &str) -> TaskDescriptor {
        let mut task = task(gid, TaskStatus::Complete);
        task.completed_length = task.total_length;
        task
    }

    /// A magnet task still fetching metadata.
    pub fn metadata_task(gid: &str, info_hash: &str) -> TaskDescriptor {
        TaskDescriptor::new(gid, TaskStatus::Active, DOWNLOAD_DIR)
            .with_file(format!("[METADATA]{}", info_hash), 0)
    }

    /// The real torrent download spawned once `metadata_gid` resolved.
    pub fn resolved_torrent(gid: &str, metadata_gid: &str, name: &str) -> TaskDescriptor {
        let mut task = TaskDescriptor::new(gid, TaskStatus::Active, DOWNLOAD_DIR)
            .with_file(format!("{}/{}/{}.mkv", DOWNLOAD_DIR, name, name), 700 * 1024 * 1024)
            .with_torrent_name(name);
        task.following = Some(metadata_gid.to_string());
        task
    }
}
