//! Checkpoint: a snapshot of a workflow's execution progress.
//!
//! 記述フィールド（title, description, priority）は含まない。
//! restore で戻すのは進捗状態（task status と step 完了状態）だけ。

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CheckpointId, StepId, TaskId, WorkflowId};
use super::task::TaskStatus;
use super::workflow::Workflow;

/// Max number of pending task titles captured as next actions.
pub const NEXT_ACTION_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    #[default]
    Manual,
    Auto,
    SessionEnd,
    PhaseComplete,
}

/// Narrative summary of where the session stood at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    /// Every task id that existed at capture time.
    pub task_statuses: BTreeMap<TaskId, TaskStatus>,
    #[serde(default)]
    pub completed_steps: Vec<StepId>,
    pub session_context: SessionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reason: CheckpointReason,
}

/// Input for `CheckpointManager::create`.
#[derive(Debug, Clone, Default)]
pub struct CheckpointInput {
    pub notes: Option<String>,
    pub reason: CheckpointReason,
    pub decisions: Vec<String>,
}

impl CheckpointInput {
    pub fn new(reason: CheckpointReason) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Checkpoint {
    /// Capture the current execution state of `workflow`.
    pub fn capture(
        id: CheckpointId,
        workflow: &Workflow,
        input: CheckpointInput,
        now: DateTime<Utc>,
    ) -> Self {
        let mut ordered: Vec<_> = workflow.tasks.iter().collect();
        ordered.sort_by_key(|t| t.order);

        let current = ordered
            .iter()
            .find(|t| t.status == TaskStatus::InProgress)
            .copied();

        let session_context = SessionContext {
            goal: workflow
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| workflow.title.clone()),
            current_phase: current.map(|t| t.title.clone()),
            blockers: ordered
                .iter()
                .filter(|t| t.status == TaskStatus::Blocked)
                .map(|t| t.title.clone())
                .collect(),
            decisions: input.decisions,
            next_actions: ordered
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .take(NEXT_ACTION_LIMIT)
                .map(|t| t.title.clone())
                .collect(),
        };

        Self {
            id,
            workflow_id: workflow.id,
            current_task_id: current.map(|t| t.id),
            task_statuses: workflow.tasks.iter().map(|t| (t.id, t.status)).collect(),
            completed_steps: ordered.iter().flat_map(|t| t.completed_step_ids()).collect(),
            session_context,
            notes: input.notes,
            created_at: now,
            reason: input.reason,
        }
    }

    /// Apply this snapshot's progress state onto `workflow`.
    ///
    /// Tasks absent from the snapshot keep their status. Step completion is
    /// reset to exactly the captured set, and the current batch's outcomes
    /// follow the restored statuses. Returns the number of tasks whose
    /// status changed.
    pub fn apply_to(&self, workflow: &mut Workflow) -> usize {
        let completed: BTreeSet<StepId> = self.completed_steps.iter().copied().collect();
        let mut changed = 0;

        for task in &mut workflow.tasks {
            if let Some(status) = self.task_statuses.get(&task.id)
                && task.status != *status
            {
                task.status = *status;
                if !status.is_settled() {
                    task.completed_at = None;
                }
                changed += 1;
            }

            for step in &mut task.steps {
                if completed.contains(&step.id) {
                    if !step.completed {
                        step.completed = true;
                        step.completed_at = Some(self.created_at);
                    }
                } else {
                    step.reset();
                }
            }
        }

        if let Some(batch) = workflow.current_batch.as_mut() {
            let tasks = &workflow.tasks;
            batch.resync(|id| tasks.iter().find(|t| t.id == id).map(|t| t.status));
        }
        changed
    }

    /// Short human-readable summary.
    pub fn summary(&self) -> String {
        let count = |s: TaskStatus| self.task_statuses.values().filter(|v| **v == s).count();
        let mut lines = vec![
            format!("Checkpoint: {} ({:?})", self.id, self.reason),
            format!("Created: {}", self.created_at.to_rfc3339()),
            format!("Goal: {}", self.session_context.goal),
            format!(
                "Completed: {}/{} Failed: {}",
                count(TaskStatus::Completed),
                self.task_statuses.len(),
                count(TaskStatus::Failed)
            ),
        ];
        if let Some(phase) = &self.session_context.current_phase {
            lines.push(format!("Current: {phase}"));
        }
        if !self.session_context.blockers.is_empty() {
            lines.push(format!("Blockers: {}", self.session_context.blockers.join(", ")));
        }
        lines.join("\n")
    }
}
