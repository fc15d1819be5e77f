//! BatchScheduler - 依存関係を満たしたタスクをバッチとして選ぶ
//!
//! # 選択ルール
//! - status が pending で、dependsOn がすべて completed のタスクだけが対象
//! - priority（critical 先頭）→ order の昇順で並べる
//! - 先頭から batch size 件まで（引数 → workflow 設定 → ストア既定値）

use std::collections::HashSet;

use crate::app::store::WorkflowStore;
use crate::app::tasks::apply_task_status;
use crate::domain::{
    BatchExecution, EventInput, EventType, StoreError, Task, TaskId, TaskStatus, Workflow,
    WorkflowId, WorkflowStatus,
};

pub struct BatchScheduler<'a> {
    store: &'a WorkflowStore,
}

impl<'a> BatchScheduler<'a> {
    pub(crate) fn new(store: &'a WorkflowStore) -> Self {
        Self { store }
    }

    /// Tasks that could start now, at most `batch_size` of them.
    pub async fn next_batch(
        &self,
        workflow_id: WorkflowId,
        batch_size: Option<usize>,
    ) -> Result<Vec<Task>, StoreError> {
        let Some(workflow) = self.store.load(workflow_id).await? else {
            return Ok(Vec::new());
        };
        let limit = batch_size.unwrap_or_else(|| self.default_size(&workflow));
        Ok(select_batch(&workflow, limit).into_iter().cloned().collect())
    }

    /// Start the next batch: mark its tasks in progress and make the workflow active.
    ///
    /// Returns `None` when the workflow is unknown or nothing is eligible.
    pub async fn start_batch(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<BatchExecution>, StoreError> {
        let limit = self.store.config().default_batch_size;
        let started = self
            .store
            .mutate(workflow_id, |wf, now| {
                let size = wf.batch_size(limit);
                let task_ids: Vec<TaskId> = select_batch(wf, size).iter().map(|t| t.id).collect();
                if task_ids.is_empty() {
                    return Ok(None);
                }

                let mut events = Vec::new();
                wf.last_batch_number += 1;
                let batch = BatchExecution::start(wf.last_batch_number, task_ids.clone(), now);
                // 先に current_batch を差し替えて、前のバッチに結果が記録されないようにする
                wf.current_batch = Some(batch.clone());

                for id in &task_ids {
                    apply_task_status(wf, *id, TaskStatus::InProgress, now, &mut events);
                }
                if let Some(previous) = wf.set_status(WorkflowStatus::Active, now) {
                    events.push(EventInput::workflow_transition(previous, WorkflowStatus::Active));
                }
                events.push(EventInput::new(EventType::BatchStarted).payload(serde_json::json!({
                    "batchNumber": batch.batch_number,
                    "taskIds": task_ids,
                })));
                Ok(Some((batch, events)))
            })
            .await?;

        Ok(started.map(|(batch, _)| {
            tracing::info!(%workflow_id, batch = batch.batch_number, tasks = batch.task_ids.len(), "batch started");
            batch
        }))
    }

    /// Pending work remains but nothing is eligible and nothing is running.
    pub async fn is_stalled(&self, workflow_id: WorkflowId) -> Result<bool, StoreError> {
        let Some(workflow) = self.store.load(workflow_id).await? else {
            return Ok(false);
        };
        let any_pending = workflow.tasks.iter().any(|t| t.status == TaskStatus::Pending);
        let any_running = workflow.tasks.iter().any(|t| {
            matches!(
                t.status,
                TaskStatus::InProgress | TaskStatus::Verifying | TaskStatus::Review
            )
        });
        Ok(any_pending && !any_running && select_batch(&workflow, 1).is_empty())
    }

    fn default_size(&self, workflow: &Workflow) -> usize {
        workflow.batch_size(self.store.config().default_batch_size)
    }
}

/// Eligible tasks in scheduling order, truncated to `limit`.
fn select_batch(workflow: &Workflow, limit: usize) -> Vec<&Task> {
    let completed: HashSet<TaskId> = workflow
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id)
        .collect();

    let mut eligible: Vec<&Task> = workflow
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| t.depends_on.iter().all(|d| completed.contains(d)))
        .collect();
    eligible.sort_by_key(|t| (t.priority.rank(), t.order));
    eligible.truncate(limit);
    eligible
}
