//! Record key layout under the storage root.
//!
//! ```text
//! index.json
//! workflows/<wf-id>/workflow.json
//! workflows/<wf-id>/events.jsonl
//! workflows/<wf-id>/checkpoints/<cp-id>.json
//! ```

use crate::domain::{CheckpointId, WorkflowId};

pub const INDEX_KEY: &str = "index.json";
pub const WORKFLOWS_DIR: &str = "workflows";

pub fn workflow_dir(id: WorkflowId) -> String {
    format!("{WORKFLOWS_DIR}/{id}")
}

pub fn workflow_key(id: WorkflowId) -> String {
    format!("{}/workflow.json", workflow_dir(id))
}

pub fn events_key(id: WorkflowId) -> String {
    format!("{}/events.jsonl", workflow_dir(id))
}

pub fn checkpoints_dir(id: WorkflowId) -> String {
    format!("{}/checkpoints", workflow_dir(id))
}

pub fn checkpoint_key(workflow_id: WorkflowId, checkpoint_id: CheckpointId) -> String {
    format!("{}/{checkpoint_id}.json", checkpoints_dir(workflow_id))
}
