//! Local mirror of the daemon's global default options.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::{Mutex, RwLock};

/// Write-through cache of global options.
///
/// Every mutation runs the daemon write first and touches the cache only
/// after it succeeds. Mutations are serialized, so readers never observe a
/// value the daemon has not committed and two writers cannot commit in one
/// order and cache in the other.
#[derive(Debug, Default)]
pub struct GlobalOptionCache {
    values: RwLock<HashMap<String, String>>,
    writer: Mutex<()>,
}

impl GlobalOptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Commit `key = value` to the daemon via `commit`, then cache it.
    pub async fn write_through<F, Fut, E>(&self, key: &str, value: &str, commit: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let _writer = self.writer.lock().await;
        commit().await?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Replace the whole cache with what `fetch` reads from the daemon.
    /// Returns the number of cached options.
    pub async fn replace_from<F, Fut, E>(&self, fetch: F) -> Result<usize, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashMap<String, String>, E>>,
    {
        let _writer = self.writer.lock().await;
        let fresh = fetch().await?;
        let count = fresh.len();
        *self.values.write().await = fresh;
        Ok(count)
    }
}
