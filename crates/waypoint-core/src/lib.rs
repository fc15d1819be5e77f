//! waypoint-core
//!
//! Durable store for multi-step workflow executions: workflows own ordered
//! tasks, progress is derived from task statuses, every change is journaled,
//! and checkpoints capture enough state to resume a session later.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, workflow, task, checkpoint, events, batch, errors）
//! - **ports**: 抽象化レイヤー（RecordStore, Clock, IdGenerator）
//! - **impls**: 実装（FsRecordStore, InMemoryRecordStore）
//! - **app**: アプリケーションロジック（WorkflowStore, CheckpointManager, BatchScheduler）
//! - **config**: ストア設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BuildError, StoreBuilder, WorkflowStore};
pub use config::StoreConfig;
pub use domain::StoreError;
