//! Events - ワークフローの監査ログ
//!
//! イベントは追記専用で不変。現在状態の正本は Workflow レコード側にあり、
//! ログを replay して状態を再構築することはしない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, StepId, TaskId, WorkflowId};
use super::task::TaskStatus;
use super::workflow::WorkflowStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WorkflowCreated,
    WorkflowDrafted,
    WorkflowReady,
    WorkflowStarted,
    WorkflowResumed,
    WorkflowPaused,
    WorkflowBlocked,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
    TaskAdded,
    TaskRemoved,
    TaskReset,
    TaskStarted,
    TaskVerifying,
    TaskInReview,
    TaskCompleted,
    TaskFailed,
    TaskSkipped,
    TaskBlocked,
    StepCompleted,
    CheckpointCreated,
    CheckpointRestored,
    BatchStarted,
    BatchCompleted,
}

impl EventType {
    /// Event for a workflow status transition.
    pub fn for_workflow_transition(from: WorkflowStatus, to: WorkflowStatus) -> Self {
        match (from, to) {
            (WorkflowStatus::Paused, WorkflowStatus::Active) => EventType::WorkflowResumed,
            (_, WorkflowStatus::Draft) => EventType::WorkflowDrafted,
            (_, WorkflowStatus::Ready) => EventType::WorkflowReady,
            (_, WorkflowStatus::Active) => EventType::WorkflowStarted,
            (_, WorkflowStatus::Paused) => EventType::WorkflowPaused,
            (_, WorkflowStatus::Blocked) => EventType::WorkflowBlocked,
            (_, WorkflowStatus::Completed) => EventType::WorkflowCompleted,
            (_, WorkflowStatus::Failed) => EventType::WorkflowFailed,
            (_, WorkflowStatus::Cancelled) => EventType::WorkflowCancelled,
        }
    }

    /// Event for a task status transition.
    pub fn for_task_status(to: TaskStatus) -> Self {
        match to {
            TaskStatus::Pending => EventType::TaskReset,
            TaskStatus::InProgress => EventType::TaskStarted,
            TaskStatus::Verifying => EventType::TaskVerifying,
            TaskStatus::Review => EventType::TaskInReview,
            TaskStatus::Completed => EventType::TaskCompleted,
            TaskStatus::Failed => EventType::TaskFailed,
            TaskStatus::Skipped => EventType::TaskSkipped,
            TaskStatus::Blocked => EventType::TaskBlocked,
        }
    }
}

/// A persisted, immutable journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub id: EventId,
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// What a caller supplies to append an event; id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInput {
    pub event_type: EventType,
    pub task_id: Option<TaskId>,
    pub step_id: Option<StepId>,
    pub payload: serde_json::Value,
    pub actor: Option<String>,
}

impl EventInput {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            task_id: None,
            step_id: None,
            payload: serde_json::Value::Null,
            actor: None,
        }
    }

    pub fn task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn workflow_transition(from: WorkflowStatus, to: WorkflowStatus) -> Self {
        Self::new(EventType::for_workflow_transition(from, to))
            .payload(serde_json::json!({ "from": from, "to": to }))
    }

    pub fn task_transition(task_id: TaskId, from: TaskStatus, to: TaskStatus) -> Self {
        Self::new(EventType::for_task_status(to))
            .task(task_id)
            .payload(serde_json::json!({ "from": from, "to": to }))
    }
}
