//! CheckpointManager - 実行状態のスナップショット
//!
//! スナップショットは `checkpoints/<cp-id>.json` に個別に保存し、
//! 同じ内容を Workflow.checkpoints にも積む。
//! 壊れたスナップショットファイルは warn を出して「存在しない」扱いにする。

use crate::app::layout;
use crate::app::store::WorkflowStore;
use crate::domain::{
    Checkpoint, CheckpointId, CheckpointInput, EventInput, EventType, StoreError, Workflow,
    WorkflowId,
};

/// Borrowed view over a `WorkflowStore` for checkpoint operations.
pub struct CheckpointManager<'a> {
    store: &'a WorkflowStore,
}

impl<'a> CheckpointManager<'a> {
    pub(crate) fn new(store: &'a WorkflowStore) -> Self {
        Self { store }
    }

    /// Snapshot the workflow's current progress state.
    pub async fn create(
        &self,
        workflow_id: WorkflowId,
        input: CheckpointInput,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let store = self.store;
        let _guard = store.lock(workflow_id).await;
        let Some(mut workflow) = store.load(workflow_id).await? else {
            return Ok(None);
        };

        let now = store.now();
        let checkpoint = Checkpoint::capture(store.ids().generate_checkpoint_id(), &workflow, input, now);
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        store
            .records()
            .write(&layout::checkpoint_key(workflow_id, checkpoint.id), &bytes)
            .await?;

        workflow.checkpoints.push(checkpoint.clone());
        workflow.touch(now);
        let event = EventInput::new(EventType::CheckpointCreated).payload(serde_json::json!({
            "checkpointId": checkpoint.id,
            "reason": checkpoint.reason,
        }));
        store.persist(&mut workflow, vec![event]).await?;

        tracing::info!(%workflow_id, checkpoint_id = %checkpoint.id, reason = ?checkpoint.reason, "checkpoint created");
        Ok(Some(checkpoint))
    }

    pub async fn get(
        &self,
        workflow_id: WorkflowId,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let key = layout::checkpoint_key(workflow_id, checkpoint_id);
        let Some(bytes) = self.store.records().read(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!(%workflow_id, %checkpoint_id, error = %e, "ignoring malformed checkpoint");
                Ok(None)
            }
        }
    }

    /// Readable checkpoints of the workflow, oldest first.
    ///
    /// A snapshot whose file is missing or malformed is skipped, same as `get`.
    pub async fn list(&self, workflow_id: WorkflowId) -> Result<Vec<Checkpoint>, StoreError> {
        let Some(workflow) = self.store.load(workflow_id).await? else {
            return Ok(Vec::new());
        };
        let mut checkpoints = Vec::with_capacity(workflow.checkpoints.len());
        for embedded in &workflow.checkpoints {
            if let Some(checkpoint) = self.get(workflow_id, embedded.id).await? {
                checkpoints.push(checkpoint);
            }
        }
        checkpoints.sort_by_key(|c| (c.created_at, c.id));
        Ok(checkpoints)
    }

    pub async fn latest(&self, workflow_id: WorkflowId) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.list(workflow_id).await?.pop())
    }

    /// Reset task statuses and step completion to the snapshot.
    ///
    /// Descriptive fields (title, description, priority, ...) are left as they are.
    pub async fn restore(
        &self,
        workflow_id: WorkflowId,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Workflow>, StoreError> {
        let store = self.store;
        let _guard = store.lock(workflow_id).await;
        let Some(mut workflow) = store.load(workflow_id).await? else {
            return Ok(None);
        };
        let Some(checkpoint) = self.get(workflow_id, checkpoint_id).await? else {
            return Ok(None);
        };

        let changed = checkpoint.apply_to(&mut workflow);
        workflow.touch(store.now());
        let event = EventInput::new(EventType::CheckpointRestored).payload(serde_json::json!({
            "checkpointId": checkpoint_id,
            "tasksChanged": changed,
        }));
        store.persist(&mut workflow, vec![event]).await?;

        tracing::info!(%workflow_id, %checkpoint_id, tasks_changed = changed, "checkpoint restored");
        Ok(Some(workflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BatchStatus, CheckpointReason, TaskOutcome, TaskPatch, TaskSpec, TaskStatus, WorkflowSpec,
    };
    use crate::ports::{FixedClock, RecordStore};
    use crate::impls::InMemoryRecordStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    struct Fixture {
        store: WorkflowStore,
        records: Arc<InMemoryRecordStore>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let records = Arc::new(InMemoryRecordStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        let store = WorkflowStore::builder()
            .records(records.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Fixture { store, records, clock }
    }

    #[tokio::test]
    async fn create_persists_snapshot_and_lists_it() {
        let f = fixture();
        let wf = f
            .store
            .create(WorkflowSpec::new("w", "p").task(TaskSpec::new("a")))
            .await
            .unwrap();

        let cp = f
            .store
            .checkpoints()
            .create(wf.id, CheckpointInput::new(CheckpointReason::Auto).notes("before lunch"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cp.task_statuses.len(), 1);
        assert_eq!(cp.notes.as_deref(), Some("before lunch"));
        assert!(f.records.exists(&layout::checkpoint_key(wf.id, cp.id)).await.unwrap());

        let manager = f.store.checkpoints();
        assert_eq!(manager.get(wf.id, cp.id).await.unwrap(), Some(cp.clone()));
        assert_eq!(manager.list(wf.id).await.unwrap(), vec![cp.clone()]);
        assert_eq!(manager.latest(wf.id).await.unwrap(), Some(cp));
    }

    #[tokio::test]
    async fn unknown_workflow_yields_nothing() {
        let f = fixture();
        let ghost = f.store.ids().generate_workflow_id();
        let manager = f.store.checkpoints();

        assert!(manager.create(ghost, CheckpointInput::default()).await.unwrap().is_none());
        assert!(manager.list(ghost).await.unwrap().is_empty());
        assert!(manager.latest(ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_picks_newest() {
        let f = fixture();
        let wf = f.store.create(WorkflowSpec::new("w", "p")).await.unwrap();
        let manager = f.store.checkpoints();

        manager.create(wf.id, CheckpointInput::default()).await.unwrap();
        f.clock.advance(Duration::minutes(1));
        let second = manager
            .create(wf.id, CheckpointInput::new(CheckpointReason::SessionEnd))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(manager.latest(wf.id).await.unwrap().map(|c| c.id), Some(second.id));
        assert_eq!(manager.list(wf.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restore_reverts_status_but_not_titles() {
        let f = fixture();
        let wf = f
            .store
            .create(WorkflowSpec::new("w", "p").task(TaskSpec::new("a")))
            .await
            .unwrap();
        let task = wf.tasks[0].id;
        let cp = f
            .store
            .checkpoints()
            .create(wf.id, CheckpointInput::default())
            .await
            .unwrap()
            .unwrap();

        let patch = TaskPatch {
            title: Some("renamed".into()),
            status: Some(TaskStatus::Completed),
            ..TaskPatch::default()
        };
        f.store.update_task(wf.id, task, patch).await.unwrap();

        let restored = f
            .store
            .checkpoints()
            .restore(wf.id, cp.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.tasks[0].status, TaskStatus::Pending);
        assert_eq!(restored.tasks[0].title, "renamed");
        assert_eq!(restored.progress.completed, 0);

        let last = f.store.events().read_all(wf.id).await.unwrap().pop().unwrap();
        assert_eq!(last.event_type, EventType::CheckpointRestored);
        assert_eq!(last.payload["tasksChanged"], 1);
    }

    #[tokio::test]
    async fn malformed_checkpoint_is_treated_as_absent() {
        let f = fixture();
        let wf = f.store.create(WorkflowSpec::new("w", "p")).await.unwrap();
        let cp = f
            .store
            .checkpoints()
            .create(wf.id, CheckpointInput::default())
            .await
            .unwrap()
            .unwrap();

        f.records
            .write(&layout::checkpoint_key(wf.id, cp.id), b"{ not json")
            .await
            .unwrap();

        let manager = f.store.checkpoints();
        assert!(manager.get(wf.id, cp.id).await.unwrap().is_none());
        assert!(manager.list(wf.id).await.unwrap().is_empty());
        assert!(manager.latest(wf.id).await.unwrap().is_none());
        assert!(manager.restore(wf.id, cp.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_skips_unreadable_snapshot() {
        let f = fixture();
        let wf = f.store.create(WorkflowSpec::new("w", "p")).await.unwrap();
        let manager = f.store.checkpoints();

        let older = manager.create(wf.id, CheckpointInput::default()).await.unwrap().unwrap();
        f.clock.advance(Duration::minutes(1));
        let newer = manager.create(wf.id, CheckpointInput::default()).await.unwrap().unwrap();
        f.records
            .write(&layout::checkpoint_key(wf.id, newer.id), b"not json")
            .await
            .unwrap();

        let latest = manager.latest(wf.id).await.unwrap().unwrap();
        assert_eq!(latest.id, older.id);
        assert!(manager.restore(wf.id, latest.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn restore_reopens_the_current_batch() {
        let f = fixture();
        let wf = f
            .store
            .create(WorkflowSpec::new("w", "p").task(TaskSpec::new("a")).task(TaskSpec::new("b")))
            .await
            .unwrap();
        let batch = f.store.scheduler().start_batch(wf.id).await.unwrap().unwrap();
        let (a, b) = (batch.task_ids[0], batch.task_ids[1]);

        f.store
            .update_task(wf.id, a, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        let cp = f
            .store
            .checkpoints()
            .create(wf.id, CheckpointInput::default())
            .await
            .unwrap()
            .unwrap();
        f.store
            .update_task(wf.id, b, TaskPatch::status(TaskStatus::Failed))
            .await
            .unwrap();
        let failed = f.store.read(wf.id).await.unwrap().unwrap();
        assert_eq!(failed.current_batch.map(|batch| batch.status), Some(BatchStatus::Failed));

        let restored = f
            .store
            .checkpoints()
            .restore(wf.id, cp.id)
            .await
            .unwrap()
            .unwrap();
        let reopened = restored.current_batch.unwrap();
        assert_eq!(reopened.status, BatchStatus::Running);
        assert_eq!(reopened.results[&b], TaskOutcome::Pending);
        assert_eq!(reopened.results[&a], TaskOutcome::Completed);

        f.store
            .update_task(wf.id, b, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        let done = f.store.read(wf.id).await.unwrap().unwrap();
        let settled = done.current_batch.unwrap();
        assert_eq!(settled.status, BatchStatus::Completed);
        assert_eq!(settled.results[&b], TaskOutcome::Completed);

        let batch_completions = f
            .store
            .events()
            .read_all(wf.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == EventType::BatchCompleted)
            .count();
        assert_eq!(batch_completions, 2);
    }
}
