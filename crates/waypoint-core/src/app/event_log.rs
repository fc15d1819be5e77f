//! EventLog - ワークフローごとの追記専用ジャーナル
//!
//! 1 行 1 イベント（JSON Lines）。追記は RecordStore::append の 1 回呼び出しで行い、
//! 既存内容を読み直して書き戻すことはしない。

use std::sync::Arc;

use crate::app::layout;
use crate::domain::{EventInput, StoreError, WorkflowEvent, WorkflowId};
use crate::ports::{Clock, IdGenerator, RecordStore};

pub struct EventLog {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl EventLog {
    pub fn new(
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            records,
            clock,
            ids,
        }
    }

    /// Create an empty journal for a new workflow.
    pub async fn init(&self, workflow_id: WorkflowId) -> Result<(), StoreError> {
        self.records
            .write(&layout::events_key(workflow_id), b"")
            .await
    }

    /// Assign id and timestamp, then append one line.
    pub async fn append(
        &self,
        workflow_id: WorkflowId,
        input: EventInput,
    ) -> Result<WorkflowEvent, StoreError> {
        let event = WorkflowEvent {
            id: self.ids.generate_event_id(),
            workflow_id,
            task_id: input.task_id,
            step_id: input.step_id,
            event_type: input.event_type,
            payload: input.payload,
            timestamp: self.clock.now(),
            actor: input.actor,
        };

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.records
            .append(&layout::events_key(workflow_id), line.as_bytes())
            .await?;

        tracing::debug!(workflow_id = %workflow_id, event_type = ?event.event_type, "event appended");
        Ok(event)
    }

    /// All events in append order. Unparseable lines are skipped with a warning.
    pub async fn read_all(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowEvent>, StoreError> {
        let Some(bytes) = self.records.read(&layout::events_key(workflow_id)).await? else {
            return Ok(Vec::new());
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut events = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkflowEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    workflow_id = %workflow_id,
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed event line"
                ),
            }
        }
        Ok(events)
    }

    /// The last `limit` events, oldest first.
    pub async fn read_recent(
        &self,
        workflow_id: WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowEvent>, StoreError> {
        let mut events = self.read_all(workflow_id).await?;
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;
    use crate::impls::InMemoryRecordStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use ulid::Ulid;

    fn log() -> (EventLog, Arc<InMemoryRecordStore>) {
        let records = Arc::new(InMemoryRecordStore::new());
        let log = EventLog::new(
            records.clone(),
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
        );
        (log, records)
    }

    #[tokio::test]
    async fn missing_journal_reads_empty() {
        let (log, _) = log();
        let wf = WorkflowId::from_ulid(Ulid::new());
        assert!(log.read_all(wf).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_then_read_preserves_order() {
        let (log, _) = log();
        let wf = WorkflowId::from_ulid(Ulid::new());
        log.init(wf).await.unwrap();

        log.append(wf, EventInput::new(EventType::WorkflowCreated)).await.unwrap();
        log.append(wf, EventInput::new(EventType::WorkflowStarted).actor("agent"))
            .await
            .unwrap();

        let events = log.read_all(wf).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::WorkflowCreated, EventType::WorkflowStarted]);
        assert_eq!(events[1].actor.as_deref(), Some("agent"));
        assert!(events.iter().all(|e| e.workflow_id == wf));
    }

    #[tokio::test]
    async fn read_recent_returns_tail() {
        let (log, _) = log();
        let wf = WorkflowId::from_ulid(Ulid::new());
        for _ in 0..4 {
            log.append(wf, EventInput::new(EventType::TaskAdded)).await.unwrap();
        }
        log.append(wf, EventInput::new(EventType::BatchStarted)).await.unwrap();

        let recent = log.read_recent(wf, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].event_type, EventType::BatchStarted);

        assert_eq!(log.read_recent(wf, 50).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let (log, records) = log();
        let wf = WorkflowId::from_ulid(Ulid::new());
        log.append(wf, EventInput::new(EventType::WorkflowCreated)).await.unwrap();
        records
            .append(&layout::events_key(wf), b"{not json\n")
            .await
            .unwrap();
        log.append(wf, EventInput::new(EventType::WorkflowPaused)).await.unwrap();

        assert_eq!(log.read_all(wf).await.unwrap().len(), 2);
    }
}
