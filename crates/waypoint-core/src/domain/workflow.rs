//! Workflow aggregate: a workflow owns its tasks, checkpoints and current batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::BatchExecution;
use super::checkpoint::Checkpoint;
use super::ids::{TaskId, WorkflowId};
use super::task::{Task, TaskSpec, TaskStatus};

/// Workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Ready,
    Active,
    Paused,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// Is this a terminal state (stamps `completed_at`)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

/// Progress derived from task statuses.
///
/// Never trusted as stored state: always recomputed with [`Progress::from_tasks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub percentage: u8,
}

impl Progress {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let failed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        let percentage = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u8
        };
        Self {
            total,
            completed,
            failed,
            percentage,
        }
    }

    pub fn has_incomplete_work(&self) -> bool {
        self.completed < self.total
    }
}

/// Execution knobs for the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Max tasks per batch. Falls back to the store default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Canonical workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<BatchExecution>,
    #[serde(default)]
    pub last_batch_number: u32,
}

impl Workflow {
    pub fn refresh_progress(&mut self) {
        self.progress = Progress::from_tasks(&self.tasks);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Apply a status change and its timestamp side effects.
    ///
    /// Returns the previous status when the status actually changed.
    pub fn set_status(
        &mut self,
        status: WorkflowStatus,
        now: DateTime<Utc>,
    ) -> Option<WorkflowStatus> {
        if self.status == status {
            return None;
        }
        let previous = self.status;
        self.status = status;
        if status == WorkflowStatus::Active && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.completed_at = status.is_terminal().then_some(now);
        Some(previous)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Re-establish dense `0..n-1` ordering, keeping relative order.
    pub fn renumber_tasks(&mut self) {
        self.tasks.sort_by_key(|t| t.order);
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.order = i;
        }
    }

    pub fn batch_size(&self, default: usize) -> usize {
        self.execution.batch_size.unwrap_or(default)
    }
}

/// Input for creating a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note_ids: Vec<String>,
}

impl WorkflowSpec {
    pub fn new(title: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.execution.batch_size = Some(size);
        self
    }
}

/// Partial workflow update. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub project: Option<String>,
    pub tags: Option<Vec<String>>,
    pub note_ids: Option<Vec<String>>,
    pub execution: Option<ExecutionConfig>,
}

impl WorkflowPatch {
    pub fn status(status: WorkflowStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
