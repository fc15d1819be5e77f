//! Per-workflow mutual exclusion around read-modify-write sequences.
//!
//! 同じ workflow id への更新だけを直列化する。別 id 同士は並行に進む。
//! イベントログの追記はこのロックに依存しない（追記自体がアトミック）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::WorkflowId;

#[derive(Debug, Default)]
pub struct WorkflowLocks {
    inner: Mutex<HashMap<WorkflowId, Arc<AsyncMutex<()>>>>,
}

impl WorkflowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: WorkflowId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock slot of a deleted workflow.
    pub fn forget(&self, id: WorkflowId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}
