//! Task operations on a stored workflow.

use chrono::{DateTime, Utc};

use crate::app::store::{WorkflowStore, validate_dependencies};
use crate::domain::{
    EventInput, EventType, StepId, StoreError, Task, TaskFilter, TaskId, TaskPatch, TaskSpec,
    TaskStatus, TaskStep, Workflow, WorkflowId,
};

impl WorkflowStore {
    /// Append a task at the end of the workflow.
    pub async fn add_task(
        &self,
        workflow_id: WorkflowId,
        spec: TaskSpec,
    ) -> Result<Option<Task>, StoreError> {
        let added = self
            .mutate(workflow_id, |wf, _now| {
                let task = self.build_task(wf.id, spec, wf.tasks.len());
                wf.tasks.push(task.clone());
                validate_dependencies(&wf.tasks)?;

                let event = EventInput::new(EventType::TaskAdded)
                    .task(task.id)
                    .payload(serde_json::json!({ "title": task.title, "order": task.order }));
                Ok(Some((task, vec![event])))
            })
            .await?;
        Ok(added.map(|(task, _)| task))
    }

    pub async fn update_task(
        &self,
        workflow_id: WorkflowId,
        task_id: TaskId,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let updated = self
            .mutate(workflow_id, |wf, now| {
                let Some(task) = wf.task_mut(task_id) else {
                    return Ok(None);
                };
                if let Some(title) = patch.title {
                    task.title = title;
                }
                if let Some(description) = patch.description {
                    task.description = description;
                }
                if let Some(priority) = patch.priority {
                    task.priority = priority;
                }
                if let Some(estimate) = patch.estimate {
                    task.estimate = Some(estimate);
                }
                if let Some(gate) = patch.completion_gate {
                    task.completion_gate = gate;
                }
                if let Some(review) = patch.review_required {
                    task.review_required = review;
                }
                if let Some(note_ids) = patch.note_ids {
                    task.note_ids = note_ids;
                }
                if let Some(files) = patch.files {
                    task.files = files;
                }
                if let Some(tags) = patch.tags {
                    task.tags = tags;
                }
                if let Some(depends_on) = patch.depends_on {
                    task.depends_on = depends_on;
                    validate_dependencies(&wf.tasks)?;
                }

                let mut events = Vec::new();
                if let Some(status) = patch.status {
                    apply_task_status(wf, task_id, status, now, &mut events);
                }

                let task = wf.task(task_id).cloned();
                Ok(task.map(|t| (t, events)))
            })
            .await?;
        Ok(updated.map(|(task, _)| task))
    }

    /// Remove a task, renumber the survivors, and drop it from their `dependsOn`.
    pub async fn remove_task(
        &self,
        workflow_id: WorkflowId,
        task_id: TaskId,
    ) -> Result<bool, StoreError> {
        let removed = self
            .mutate(workflow_id, |wf, _now| {
                let Some(pos) = wf.tasks.iter().position(|t| t.id == task_id) else {
                    return Ok(None);
                };
                let task = wf.tasks.remove(pos);
                for other in &mut wf.tasks {
                    other.depends_on.retain(|d| *d != task_id);
                }
                wf.renumber_tasks();

                let mut events = vec![
                    EventInput::new(EventType::TaskRemoved)
                        .task(task_id)
                        .payload(serde_json::json!({ "title": task.title })),
                ];
                if let Some(batch) = wf.current_batch.as_mut()
                    && let Some(status) = batch.forget(task_id)
                {
                    events.push(batch_completed(batch.batch_number, status));
                }
                Ok(Some(((), events)))
            })
            .await?;
        Ok(removed.is_some())
    }

    /// Tasks matching `filter`, in `order`. Empty when the workflow is unknown.
    pub async fn get_tasks(
        &self,
        workflow_id: WorkflowId,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        let Some(workflow) = self.load(workflow_id).await? else {
            return Ok(Vec::new());
        };
        let mut tasks: Vec<Task> = workflow
            .tasks
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        tasks.sort_by_key(|t| t.order);
        Ok(tasks)
    }

    pub async fn add_step(
        &self,
        workflow_id: WorkflowId,
        task_id: TaskId,
        description: impl Into<String>,
    ) -> Result<Option<TaskStep>, StoreError> {
        let step = TaskStep::new(self.ids().generate_step_id(), description);
        let added = self
            .mutate(workflow_id, |wf, _now| {
                let Some(task) = wf.task_mut(task_id) else {
                    return Ok(None);
                };
                task.steps.push(step.clone());
                Ok(Some((step, Vec::new())))
            })
            .await?;
        Ok(added.map(|(step, _)| step))
    }

    /// Mark a step completed, recording optional evidence.
    pub async fn complete_step(
        &self,
        workflow_id: WorkflowId,
        task_id: TaskId,
        step_id: StepId,
        evidence: Option<String>,
    ) -> Result<Option<TaskStep>, StoreError> {
        let completed = self
            .mutate(workflow_id, |wf, now| {
                let Some(step) = wf.task_mut(task_id).and_then(|t| t.step_mut(step_id)) else {
                    return Ok(None);
                };
                step.mark_completed(now, evidence);
                let step = step.clone();

                let event = EventInput::new(EventType::StepCompleted)
                    .task(task_id)
                    .step(step_id)
                    .payload(serde_json::json!({
                        "description": step.description,
                        "evidence": step.evidence,
                    }));
                Ok(Some((step, vec![event])))
            })
            .await?;
        Ok(completed.map(|(step, _)| step))
    }
}

/// Change one task's status, record it in the current batch, and queue the events.
///
/// No-op when the task is missing or already has `status`.
pub(crate) fn apply_task_status(
    wf: &mut Workflow,
    task_id: TaskId,
    status: TaskStatus,
    now: DateTime<Utc>,
    events: &mut Vec<EventInput>,
) {
    let Some(previous) = wf
        .task_mut(task_id)
        .and_then(|task| task.set_status(status, now))
    else {
        return;
    };
    events.push(EventInput::task_transition(task_id, previous, status));

    if let Some(batch) = wf.current_batch.as_mut().filter(|b| b.contains(task_id))
        && let Some(settled) = batch.record(task_id, status)
    {
        tracing::info!(workflow_id = %wf.id, batch = batch.batch_number, status = ?settled, "batch settled");
        events.push(batch_completed(batch.batch_number, settled));
    }
}

fn batch_completed(batch_number: u32, status: crate::domain::BatchStatus) -> EventInput {
    EventInput::new(EventType::BatchCompleted)
        .payload(serde_json::json!({ "batchNumber": batch_number, "status": status }))
}
