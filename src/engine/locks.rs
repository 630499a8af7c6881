// Keyed async locks - serialize writers per scene or per voter without one
// global bottleneck.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of per-key mutexes. `acquire(k)` suspends until the holder of
/// `k`'s lock releases it; distinct keys never contend. Entries are created
/// on demand and kept for the process lifetime, which is bounded by the
/// number of distinct parents/voters seen.
#[derive(Debug, Default)]
pub struct LockTable {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().await;
            table
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
