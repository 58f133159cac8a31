//! Stable caller-side identity for daemon tasks.
//!
//! The daemon replaces a magnet's metadata task with a new task under a new
//! gid once metadata arrives, so a gid alone cannot follow a download over
//! time. Callers hold a [`CorrelationToken`] instead; the tracker maps it to
//! the current gid and moves the mapping along the daemon's
//! `following`/`followed_by` links on every refresh.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::TaskDescriptor;

/// Caller-owned handle for one logical download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Token → current gid bindings.
#[derive(Debug, Default)]
pub struct TaskTracker {
    bindings: RwLock<HashMap<CorrelationToken, String>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a task by its current gid.
    pub async fn track(&self, gid: impl Into<String>) -> CorrelationToken {
        let token = CorrelationToken::new();
        self.bindings.write().await.insert(token, gid.into());
        token
    }

    /// Current gid for a token, as of the last refresh.
    pub async fn resolve(&self, token: &CorrelationToken) -> Option<String> {
        self.bindings.read().await.get(token).cloned()
    }

    /// Stop tracking; returns the last known gid.
    pub async fn untrack(&self, token: &CorrelationToken) -> Option<String> {
        self.bindings.write().await.remove(token)
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }

    /// Rebind tokens whose task has been succeeded by another, using a fresh
    /// enumeration. Returns how many tokens moved.
    pub async fn refresh(&self, tasks: &[TaskDescriptor]) -> usize {
        let mut successors: HashMap<&str, &str> = HashMap::new();
        for task in tasks {
            if let Some(previous) = task.following.as_deref() {
                successors.insert(previous, task.gid.as_str());
            }
            if let Some(next) = task.followed_by.first() {
                successors.entry(task.gid.as_str()).or_insert(next.as_str());
            }
        }
        if successors.is_empty() {
            return 0;
        }

        let mut bindings = self.bindings.write().await;
        let mut moved = 0;
        for (token, gid) in bindings.iter_mut() {
            let start = gid.clone();
            let mut hops = 0;
            while let Some(next) = successors.get(gid.as_str()) {
                // Bounded so a malformed cycle cannot spin forever.
                if hops == successors.len() {
                    break;
                }
                debug!(token = %token, from = %gid, to = %next, "Task succeeded by new gid");
                *gid = next.to_string();
                hops += 1;
            }
            if *gid != start {
                moved += 1;
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[tokio::test]
    async fn test_track_and_resolve() {
        let tracker = TaskTracker::new();
        let token = tracker.track("meta01").await;

        assert_eq!(tracker.resolve(&token).await.as_deref(), Some("meta01"));
        assert_eq!(tracker.len().await, 1);

        assert_eq!(tracker.untrack(&token).await.as_deref(), Some("meta01"));
        assert!(tracker.resolve(&token).await.is_none());
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_follows_new_task() {
        let tracker = TaskTracker::new();
        let token = tracker.track("meta01").await;

        let mut real = TaskDescriptor::new("real01", TaskStatus::Active, "/d")
            .with_file("/d/show/ep1.mkv", 10);
        real.following = Some("meta01".to_string());

        assert_eq!(tracker.refresh(&[real]).await, 1);
        assert_eq!(tracker.resolve(&token).await.as_deref(), Some("real01"));
    }

    #[tokio::test]
    async fn test_refresh_follows_followed_by() {
        let tracker = TaskTracker::new();
        let token = tracker.track("meta01").await;

        let mut meta = TaskDescriptor::new("meta01", TaskStatus::Complete, "/d")
            .with_file("[METADATA]abc", 0);
        meta.followed_by = vec!["real01".to_string()];

        assert_eq!(tracker.refresh(&[meta]).await, 1);
        assert_eq!(tracker.resolve(&token).await.as_deref(), Some("real01"));
    }

    #[tokio::test]
    async fn test_refresh_leaves_unrelated_tokens() {
        let tracker = TaskTracker::new();
        let stable = tracker.track("plain01").await;
        let magnet = tracker.track("meta01").await;

        let plain = TaskDescriptor::new("plain01", TaskStatus::Active, "/d");
        let mut real = TaskDescriptor::new("real01", TaskStatus::Active, "/d");
        real.following = Some("meta01".to_string());

        assert_eq!(tracker.refresh(&[plain, real]).await, 1);
        assert_eq!(tracker.resolve(&stable).await.as_deref(), Some("plain01"));
        assert_eq!(tracker.resolve(&magnet).await.as_deref(), Some("real01"));
    }

    #[tokio::test]
    async fn test_refresh_cycle_terminates() {
        let tracker = TaskTracker::new();
        tracker.track("a").await;

        let mut a = TaskDescriptor::new("a", TaskStatus::Active, "/d");
        a.following = Some("b".to_string());
        let mut b = TaskDescriptor::new("b", TaskStatus::Active, "/d");
        b.following = Some("a".to_string());

        assert_eq!(tracker.refresh(&[a, b]).await, 0);
    }

    #[tokio::test]
    async fn test_refresh_follows_chain_to_end() {
        let tracker = TaskTracker::new();
        let token = tracker.track("a").await;

        let mut b = TaskDescriptor::new("b", TaskStatus::Active, "/d");
        b.following = Some("a".to_string());
        let mut c = TaskDescriptor::new("c", TaskStatus::Active, "/d");
        c.following = Some("b".to_string());

        assert_eq!(tracker.refresh(&[b, c]).await, 1);
        assert_eq!(tracker.resolve(&token).await.as_deref(), Some("c"));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(CorrelationToken::new(), CorrelationToken::new());
    }
}
