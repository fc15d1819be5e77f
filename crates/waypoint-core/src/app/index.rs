//! WorkflowIndex - 一覧用のサマリーテーブル（index.json）
//!
//! index は丸ごと書き換える共有ファイルなので、書き換えは専用の Mutex で直列化する。
//! 壊れた index は警告を出して空として扱い、次の書き込みで作り直される。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::app::layout::INDEX_KEY;
use crate::domain::{StoreError, WorkflowFilter, WorkflowId, WorkflowIndexEntry};
use crate::ports::RecordStore;

pub struct WorkflowIndex {
    records: Arc<dyn RecordStore>,
    write_lock: Mutex<()>,
}

impl WorkflowIndex {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            write_lock: Mutex::new(()),
        }
    }

    /// All entries. A corrupt index yields an empty list.
    pub async fn load(&self) -> Result<Vec<WorkflowIndexEntry>, StoreError> {
        let Some(bytes) = self.records.read(INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(error = %e, "workflow index is malformed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn query(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowIndexEntry>, StoreError> {
        Ok(filter.apply(self.load().await?))
    }

    /// Insert or replace the entry with the same id.
    pub async fn upsert(&self, entry: WorkflowIndexEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
        self.store(&entries).await
    }

    /// Returns whether an entry was removed.
    pub async fn remove(&self, id: WorkflowId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.store(&entries).await?;
        Ok(true)
    }

    async fn store(&self, entries: &[WorkflowIndexEntry]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        self.records.write(INDEX_KEY, &bytes).await
    }
}
