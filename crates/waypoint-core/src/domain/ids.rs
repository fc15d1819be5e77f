//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型ごとに区別します。
//! 表示・永続化時には種別プレフィックス付きの文字列（例: `wf-01J...`）になります。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **衝突しにくい**: 80-bit のランダム部を持つ
//! - **短い**: Crockford Base32 で 26 文字

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"wf-", "task-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// `WorkflowId` と `TaskId` を混同するとコンパイルエラーになります。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// ID 文字列のパース失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected_prefix} id: {value:?}")]
pub struct IdParseError {
    pub expected_prefix: &'static str,
    pub value: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IdParseError {
            expected_prefix: T::prefix(),
            value: s.to_string(),
        };
        let raw = s.strip_prefix(T::prefix()).ok_or_else(err)?;
        let ulid = Ulid::from_string(raw).map_err(|_| err())?;
        Ok(Self::from_ulid(ulid))
    }
}

// 永続化フォーマットはプレフィックス付き文字列。
// JSON の map key としても使えるよう、文字列として (de)serialize する。
impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Workflow のマーカー型
    Workflow,
    "wf-"
);
id_marker!(
    /// Task のマーカー型
    Task,
    "task-"
);
id_marker!(
    /// TaskStep のマーカー型
    Step,
    "step-"
);
id_marker!(
    /// Checkpoint のマーカー型
    Checkpoint,
    "cp-"
);
id_marker!(
    /// WorkflowEvent のマーカー型
    Event,
    "evt-"
);

/// Identifier of a Workflow (the aggregate root).
pub type WorkflowId = Id<Workflow>;

/// Identifier of a Task within a workflow.
pub type TaskId = Id<Task>;

/// Identifier of a TaskStep within a task.
pub type StepId = Id<Step>;

/// Identifier of a Checkpoint snapshot.
pub type CheckpointId = Id<Checkpoint>;

/// Identifier of an appended WorkflowEvent.
pub type EventId = Id<Event>;
