use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A mutex that locks on a key (here: the upload id), so concurrent
/// chunk calls for different uploads proceed while calls racing on the
/// same session serialize.
#[derive(Debug, Clone)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the lock for the given key.
    /// Released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Removes locks that are not currently held by any task. Called
    /// after each rebuild so the map does not grow with upload ids.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}
