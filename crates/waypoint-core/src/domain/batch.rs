//! Batch execution record: one scheduling round of concurrently runnable tasks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::task::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

/// Per-task outcome inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl TaskOutcome {
    /// Outcome implied by a task status. Unsettled statuses stay `Pending`.
    pub fn from_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Completed => TaskOutcome::Completed,
            TaskStatus::Failed => TaskOutcome::Failed,
            TaskStatus::Skipped => TaskOutcome::Skipped,
            TaskStatus::Pending
            | TaskStatus::InProgress
            | TaskStatus::Verifying
            | TaskStatus::Review
            | TaskStatus::Blocked => TaskOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecution {
    pub batch_number: u32,
    pub task_ids: Vec<TaskId>,
    pub started_at: DateTime<Utc>,
    pub status: BatchStatus,
    pub results: BTreeMap<TaskId, TaskOutcome>,
}

impl BatchExecution {
    pub fn start(batch_number: u32, task_ids: Vec<TaskId>, now: DateTime<Utc>) -> Self {
        let results = task_ids
            .iter()
            .map(|id| (*id, TaskOutcome::Pending))
            .collect();
        Self {
            batch_number,
            task_ids,
            started_at: now,
            status: BatchStatus::Running,
            results,
        }
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.results.contains_key(&task_id)
    }

    /// Record a task's new status.
    ///
    /// Returns the batch status when this call settled the whole batch.
    pub fn record(&mut self, task_id: TaskId, status: TaskStatus) -> Option<BatchStatus> {
        if self.status != BatchStatus::Running {
            return None;
        }
        let slot = self.results.get_mut(&task_id)?;
        *slot = TaskOutcome::from_status(status);
        self.settle()
    }

    /// Drop a removed task from the batch.
    ///
    /// Returns the batch status when the remaining tasks are all settled.
    pub fn forget(&mut self, task_id: TaskId) -> Option<BatchStatus> {
        if self.status != BatchStatus::Running || self.results.remove(&task_id).is_none() {
            return None;
        }
        self.task_ids.retain(|id| *id != task_id);
        self.settle()
    }

    /// Rebuild every outcome from the tasks' current statuses.
    ///
    /// Used after statuses were overwritten wholesale (checkpoint restore).
    /// The batch goes back to `Running` while any outcome is pending.
    pub fn resync(&mut self, status_of: impl Fn(TaskId) -> Option<TaskStatus>) {
        for (task_id, outcome) in self.results.iter_mut() {
            if let Some(status) = status_of(*task_id) {
                *outcome = TaskOutcome::from_status(status);
            }
        }
        self.status = BatchStatus::Running;
        self.settle();
    }

    fn settle(&mut self) -> Option<BatchStatus> {
        if self.results.values().any(|o| *o == TaskOutcome::Pending) {
            return None;
        }
        self.status = if self.results.values().any(|o| *o == TaskOutcome::Failed) {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        Some(self.status)
    }
}
