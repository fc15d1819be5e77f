//! Errors - エラー型と分類
//!
//! not-found はエラーではありません（`Ok(None)` / `Ok(false)` で返す）。
//! ここに来るのは I/O 障害と、呼び出し側のバグとみなす入力検証エラーだけです。

use thiserror::Error;

use super::ids::{IdParseError, TaskId};

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（呼び出し側でリトライしてよい）
/// - Permanent: 恒久的なエラー（同じ入力でリトライしても無意味）
/// - Infrastructure: ストレージ障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// StoreError はストア操作のエラー
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode/decode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("dependency cycle through task {task}: {}", format_cycle(.cycle))]
    DependencyCycle { task: TaskId, cycle: Vec<TaskId> },

    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Io(e) if e.kind() == std::io::ErrorKind::Interrupted => ErrorKind::Transient,
            StoreError::Io(_) => ErrorKind::Infrastructure,
            StoreError::Serialization(_) => ErrorKind::Infrastructure,
            StoreError::InvalidId(_)
            | StoreError::UnknownDependency { .. }
            | StoreError::DependencyCycle { .. }
            | StoreError::DuplicateTask(_) => ErrorKind::Permanent,
        }
    }
}

fn format_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
