//! App - アプリケーション層
//!
//! ports を組み合わせてワークフローストアを実装します。
//!
//! # 主要コンポーネント
//! - **StoreBuilder**: ストアの構築とワイヤリング
//! - **WorkflowStore**: Workflow / Task の CRUD（store.rs, tasks.rs）
//! - **EventLog**: 追記専用の監査ログ
//! - **WorkflowIndex**: 一覧用の非正規化インデックス
//! - **CheckpointManager**: スナップショットの作成と復元
//! - **BatchScheduler**: 実行可能タスクのバッチ選択

pub mod builder;
pub mod checkpoints;
pub mod event_log;
pub mod index;
pub mod layout;
pub mod locks;
pub mod scheduler;
pub mod store;
mod tasks;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, StoreBuilder};
pub use self::checkpoints::CheckpointManager;
pub use self::event_log::EventLog;
pub use self::index::WorkflowIndex;
pub use self::scheduler::BatchScheduler;
pub use self::store::WorkflowStore;
