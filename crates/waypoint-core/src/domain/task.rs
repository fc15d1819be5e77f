//! Task model: a unit of work owned by a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{StepId, TaskId, WorkflowId};

/// Task status.
///
/// State transitions are caller-driven; the store only records them.
/// Typical path: Pending -> InProgress -> (Verifying -> Review ->) Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Verifying,
    Review,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

impl TaskStatus {
    /// Is this a settled state (counts as finished for batch bookkeeping)?
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Verifying => "verifying",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Blocked => "blocked",
        }
    }
}

/// Task priority. Declaration order is scheduling order (Critical first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Scheduling rank: lower runs earlier.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

/// A checklist item of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: StepId,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl TaskStep {
    pub fn new(id: StepId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            completed: false,
            completed_at: None,
            evidence: None,
        }
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>, evidence: Option<String>) {
        self.completed = true;
        self.completed_at = Some(at);
        self.evidence = evidence;
    }

    pub fn reset(&mut self) {
        self.completed = false;
        self.completed_at = None;
        self.evidence = None;
    }
}

/// Task record embedded in its workflow.
///
/// `workflow_id` is a back-reference only; the workflow owns the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub workflow_id: WorkflowId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: TaskStatus,
    /// Dense zero-based position among siblings.
    pub order: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TaskStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
    #[serde(default)]
    pub completion_gate: bool,
    #[serde(default)]
    pub review_required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Apply a status change and its timestamp side effects.
    ///
    /// Returns the previous status when the status actually changed.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> Option<TaskStatus> {
        if self.status == status {
            return None;
        }
        let previous = self.status;
        self.status = status;
        if status == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.completed_at = status.is_settled().then_some(now);
        Some(previous)
    }

    pub fn step_mut(&mut self, step_id: StepId) -> Option<&mut TaskStep> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    pub fn completed_step_ids(&self) -> impl Iterator<Item = StepId> + '_ {
        self.steps.iter().filter(|s| s.completed).map(|s| s.id)
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Caller-chosen id (see `WorkflowStore::new_task_id`). Generated when absent.
    #[serde(default)]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Step descriptions, in checklist order.
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub estimate: Option<String>,
    #[serde(default)]
    pub completion_gate: bool,
    #[serde(default)]
    pub review_required: bool,
    #[serde(default)]
    pub note_ids: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    pub fn step(mut self, description: impl Into<String>) -> Self {
        self.steps.push(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Partial task update. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub depends_on: Option<Vec<TaskId>>,
    pub estimate: Option<String>,
    pub completion_gate: Option<bool>,
    pub review_required: Option<bool>,
    pub note_ids: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Filter for `get_tasks`. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Vec<TaskStatus>,
    pub priority: Vec<Priority>,
    pub tags: Vec<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        (self.status.is_empty() || self.status.contains(&task.status))
            && (self.priority.is_empty() || self.priority.contains(&task.priority))
            && (self.tags.is_empty() || task.has_any_tag(&self.tags))
    }
}
