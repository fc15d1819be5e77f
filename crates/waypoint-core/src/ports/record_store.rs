//! RecordStore port - 名前付きバイト列の永続化
//!
//! 上位コンポーネント（index, event log, workflow, checkpoint）は
//! すべてこの trait 経由でのみ永続化します。
//!
//! key は `/` 区切りの相対パス（例: `workflows/wf-.../workflow.json`）。
//!
//! # 実装
//! - **FsRecordStore**: ファイルシステム（本番用）
//! - **InMemoryRecordStore**: テスト・埋め込み用

use async_trait::async_trait;

use crate::domain::StoreError;

/// RecordStore は key 単位の read/write/append を提供
///
/// # 設計原則
/// - `write` は全置換。途中状態が読まれないこと（temp + rename など）
/// - `append` はアトミックな追記。read-modify-write で実装してはいけない
/// - 存在しない key の `read` は `Ok(None)`（エラーではない）
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Append `bytes` as one unit; concurrent appenders never interleave.
    async fn append(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Names of the records directly under `dir` (not recursive), sorted.
    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError>;

    /// Remove `dir` and everything below it. Returns false if nothing existed.
    async fn remove_all(&self, dir: &str) -> Result<bool, StoreError>;
}
