//! Normalized view of a daemon-reported task.

use serde::{Deserialize, Serialize};

use super::name::{derive_name, is_metadata_only};

/// Status of a task as reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, not yet transferring.
    Waiting,
    /// Transferring.
    Active,
    /// Paused by a client.
    Paused,
    /// Finished successfully.
    Complete,
    /// Stopped by an error.
    Error,
    /// Removed by a client.
    Removed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
            TaskStatus::Removed => "removed",
        }
    }

    /// The daemon is still working on (or holding) this task. Live tasks are
    /// torn down with a forced removal; the rest only have a result record.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            TaskStatus::Waiting | TaskStatus::Active | TaskStatus::Paused
        )
    }
}

/// One file of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
    /// Absolute path, or a `[METADATA]` placeholder for unresolved magnets.
    pub path: String,
    pub length: u64,
    pub completed_length: u64,
    pub selected: bool,
}

/// Torrent information, present once the daemon knows the task is a torrent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BittorrentInfo {
    /// Torrent name from the info dictionary; absent until metadata resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
}

/// Read-only, possibly stale copy of one daemon task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Daemon id. Changes when a magnet's metadata resolves.
    pub gid: String,
    pub status: TaskStatus,
    /// Base directory files are written under.
    pub dir: String,
    pub files: Vec<TaskFile>,
    pub total_length: u64,
    pub completed_length: u64,
    /// Bytes/second.
    pub download_speed: u64,
    /// Bytes/second.
    pub upload_speed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bittorrent: Option<BittorrentInfo>,
    /// Gid of the metadata task this task was spawned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    /// Gids of the tasks spawned from this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followed_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskDescriptor {
    /// Create a descriptor with no files and zeroed counters.
    pub fn new(gid: impl Into<String>, status: TaskStatus, dir: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            status,
            dir: dir.into(),
            files: Vec::new(),
            total_length: 0,
            completed_length: 0,
            download_speed: 0,
            upload_speed: 0,
            bittorrent: None,
            following: None,
            followed_by: Vec::new(),
            error_message: None,
        }
    }

    /// Append a selected file of the given size.
    pub fn with_file(mut self, path: impl Into<String>, length: u64) -> Self {
        self.total_length += length;
        self.files.push(TaskFile {
            path: path.into(),
            length,
            completed_length: 0,
            selected: true,
        });
        self
    }

    /// Mark as a torrent with a resolved name.
    pub fn with_torrent_name(mut self, name: impl Into<String>) -> Self {
        self.bittorrent = Some(BittorrentInfo {
            name: Some(name.into()),
            ..Default::default()
        });
        self
    }

    /// Human-meaningful name, empty when undeterminable.
    pub fn name(&self) -> String {
        derive_name(self)
    }

    /// True while the task only holds magnet metadata.
    pub fn is_metadata_only(&self) -> bool {
        is_metadata_only(self)
    }

    /// Completed fraction in 0.0..=1.0; 0.0 when the size is unknown.
    pub fn progress(&self) -> f64 {
        if self.total_length == 0 {
            0.0
        } else {
            (self.completed_length as f64 / self.total_length as f64).min(1.0)
        }
    }
}
