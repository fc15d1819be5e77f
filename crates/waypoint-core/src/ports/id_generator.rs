//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::ids::{CheckpointId, EventId, Id, IdMarker, StepId, TaskId, WorkflowId};
use crate::ports::Clock;

/// IdGenerator は種別ごとの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_workflow_id(&self) -> WorkflowId;

    fn generate_task_id(&self) -> TaskId;

    fn generate_step_id(&self) -> StepId;

    fn generate_checkpoint_id(&self) -> CheckpointId;

    fn generate_event_id(&self) -> EventId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って timestamp 部分を決めるので、FixedClock と組み合わせると
/// timestamp 部分が決定的になります（ランダム部分は毎回異なる）。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<T: IdMarker>(&self) -> Id<T> {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Id::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_workflow_id(&self) -> WorkflowId {
        self.next()
    }

    fn generate_task_id(&self) -> TaskId {
        self.next()
    }

    fn generate_step_id(&self) -> StepId {
        self.next()
    }

    fn generate_checkpoint_id(&self) -> CheckpointId {
        self.next()
    }

    fn generate_event_id(&self) -> EventId {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_workflow_id();
        let id2 = id_gen.generate_workflow_id();
        let id3 = id_gen.generate_workflow_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn fixed_clock_pins_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn each_kind_has_its_prefix() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_workflow_id().to_string().starts_with("wf-"));
        assert!(id_gen.generate_task_id().to_string().starts_with("task-"));
        assert!(id_gen.generate_step_id().to_string().starts_with("step-"));
        assert!(id_gen.generate_checkpoint_id().to_string().starts_with("cp-"));
        assert!(id_gen.generate_event_id().to_string().starts_with("evt-"));
    }
}
