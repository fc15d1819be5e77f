//! StoreBuilder - WorkflowStore の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 未指定の port はデフォルト実装で埋める（FsRecordStore, SystemClock, UlidGenerator）
//! - 不正な設定は build() 時に BuildError として返す

use std::sync::Arc;

use crate::app::store::WorkflowStore;
use crate::config::StoreConfig;
use crate::impls::{FsRecordStore, InMemoryRecordStore};
use crate::ports::{Clock, IdGenerator, RecordStore, SystemClock, UlidGenerator};

/// BuildError はストア構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("default batch size must be at least 1 (got {0})")]
    InvalidBatchSize(usize),
}

/// StoreBuilder は WorkflowStore を構築
///
/// # 使用例
/// ```ignore
/// let store = StoreBuilder::new()
///     .config(StoreConfig::new("/var/lib/waypoint"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    records: Option<Arc<dyn RecordStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Persistence backend. Defaults to `FsRecordStore` at `config.root`.
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Keep everything in process memory.
    pub fn in_memory(self) -> Self {
        self.records(Arc::new(InMemoryRecordStore::new()))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Id source. Defaults to a `UlidGenerator` driven by the configured clock.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<WorkflowStore, BuildError> {
        if self.config.default_batch_size == 0 {
            return Err(BuildError::InvalidBatchSize(0));
        }

        let records: Arc<dyn RecordStore> = match self.records {
            Some(records) => records,
            None => Arc::new(FsRecordStore::new(self.config.root.clone())),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };

        tracing::debug!(root = %self.config.root.display(), "workflow store built");
        Ok(WorkflowStore::from_parts(records, clock, ids, self.config))
    }
}
