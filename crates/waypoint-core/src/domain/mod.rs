//! Domain model (IDs, workflow aggregate, tasks, checkpoints, events, ...).
//!
//! このモジュールは永続化やロックを知らない純粋なデータモデルです。
//! 派生値（progress）の計算や状態遷移の副作用はここで定義します。

pub mod batch;
pub mod checkpoint;
pub mod dependency;
pub mod errors;
pub mod events;
pub mod ids;
pub mod index;
pub mod task;
pub mod workflow;

pub use batch::{BatchExecution, BatchStatus, TaskOutcome};
pub use checkpoint::{Checkpoint, CheckpointInput, CheckpointReason, SessionContext};
pub use dependency::DependencyGraph;
pub use errors::{ErrorKind, StoreError};
pub use events::{EventInput, EventType, WorkflowEvent};
pub use ids::{CheckpointId, EventId, IdParseError, StepId, TaskId, WorkflowId};
pub use index::{WorkflowFilter, WorkflowIndexEntry};
pub use task::{Priority, Task, TaskFilter, TaskPatch, TaskSpec, TaskStatus, TaskStep};
pub use workflow::{ExecutionConfig, Progress, Workflow, WorkflowPatch, WorkflowSpec, WorkflowStatus};
