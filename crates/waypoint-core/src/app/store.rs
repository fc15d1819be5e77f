//! WorkflowStore - Workflow 集約の CRUD
//!
//! 変更系の操作はすべて同じ手順を踏む:
//! 1. workflow id ごとのロックを取る
//! 2. 正本（workflow.json）を読む
//! 3. メモリ上で変更し、progress を再計算する
//! 4. 正本を書く → index を更新する → イベントを追記する
//!
//! 4 の 3 つの書き込みはまとめてアトミックではない。
//! 存在しない workflow / task への操作は `Ok(None)` / `Ok(false)` で返す。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::app::builder::{BuildError, StoreBuilder};
use crate::app::checkpoints::CheckpointManager;
use crate::app::event_log::EventLog;
use crate::app::index::WorkflowIndex;
use crate::app::layout;
use crate::app::locks::WorkflowLocks;
use crate::app::scheduler::BatchScheduler;
use crate::config::StoreConfig;
use crate::domain::{
    DependencyGraph, EventInput, EventType, Progress, StoreError, Task, TaskId, TaskSpec,
    TaskStatus, TaskStep, Workflow, WorkflowFilter, WorkflowId, WorkflowIndexEntry, WorkflowPatch,
    WorkflowSpec, WorkflowStatus,
};
use crate::ports::{Clock, IdGenerator, RecordStore};

pub struct WorkflowStore {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    index: WorkflowIndex,
    events: EventLog,
    locks: WorkflowLocks,
    config: StoreConfig,
}

impl WorkflowStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Filesystem-backed store at `config.root` with the system clock.
    pub fn open(config: StoreConfig) -> Result<Self, BuildError> {
        StoreBuilder::new().config(config).build()
    }

    pub(crate) fn from_parts(
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: StoreConfig,
    ) -> Self {
        Self {
            index: WorkflowIndex::new(Arc::clone(&records)),
            events: EventLog::new(Arc::clone(&records), Arc::clone(&clock), Arc::clone(&ids)),
            locks: WorkflowLocks::new(),
            records,
            clock,
            ids,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn checkpoints(&self) -> CheckpointManager<'_> {
        CheckpointManager::new(self)
    }

    pub fn scheduler(&self) -> BatchScheduler<'_> {
        BatchScheduler::new(self)
    }

    /// Pre-allocate a task id, e.g. so initial tasks of `create` can depend on each other.
    pub fn new_task_id(&self) -> TaskId {
        self.ids.generate_task_id()
    }

    // ========================================
    // Workflow CRUD
    // ========================================

    pub async fn create(&self, spec: WorkflowSpec) -> Result<Workflow, StoreError> {
        let id = self.ids.generate_workflow_id();
        let now = self.clock.now();

        let mut tasks = Vec::with_capacity(spec.tasks.len());
        for (order, task_spec) in spec.tasks.into_iter().enumerate() {
            tasks.push(self.build_task(id, task_spec, order));
        }
        validate_dependencies(&tasks)?;

        let mut workflow = Workflow {
            id,
            title: spec.title,
            description: spec.description,
            status: WorkflowStatus::Draft,
            project: spec.project,
            tasks,
            execution: spec.execution,
            checkpoints: Vec::new(),
            progress: Progress::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            tags: spec.tags,
            note_ids: spec.note_ids,
            current_batch: None,
            last_batch_number: 0,
        };
        workflow.refresh_progress();

        let _guard = self.locks.acquire(id).await;
        self.write_record(&workflow).await?;
        self.events.init(id).await?;
        self.index.upsert(WorkflowIndexEntry::from(&workflow)).await?;
        self.events
            .append(
                id,
                EventInput::new(EventType::WorkflowCreated).payload(serde_json::json!({
                    "title": workflow.title,
                    "project": workflow.project,
                    "taskCount": workflow.tasks.len(),
                })),
            )
            .await?;

        tracing::info!(workflow_id = %id, title = %workflow.title, tasks = workflow.tasks.len(), "workflow created");
        Ok(workflow)
    }

    pub async fn read(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        self.load(id).await
    }

    pub async fn update(
        &self,
        id: WorkflowId,
        patch: WorkflowPatch,
    ) -> Result<Option<Workflow>, StoreError> {
        let updated = self
            .mutate(id, |wf, now| {
                let mut events = Vec::new();
                if let Some(title) = patch.title {
                    wf.title = title;
                }
                if let Some(description) = patch.description {
                    wf.description = Some(description);
                }
                if let Some(project) = patch.project {
                    wf.project = project;
                }
                if let Some(tags) = patch.tags {
                    wf.tags = tags;
                }
                if let Some(note_ids) = patch.note_ids {
                    wf.note_ids = note_ids;
                }
                if let Some(execution) = patch.execution {
                    wf.execution = execution;
                }
                if let Some(status) = patch.status
                    && let Some(previous) = wf.set_status(status, now)
                {
                    events.push(EventInput::workflow_transition(previous, status));
                }
                Ok(Some(((), events)))
            })
            .await?;
        Ok(updated.map(|((), wf)| wf))
    }

    pub async fn delete(&self, id: WorkflowId) -> Result<bool, StoreError> {
        let guard = self.locks.acquire(id).await;
        let removed_dir = self.records.remove_all(&layout::workflow_dir(id)).await?;
        let removed_entry = self.index.remove(id).await?;
        drop(guard);
        self.locks.forget(id);

        if removed_dir || removed_entry {
            tracing::info!(workflow_id = %id, "workflow deleted");
        }
        Ok(removed_dir || removed_entry)
    }

    /// Index entries matching `filter`, most recently updated first.
    pub async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowIndexEntry>, StoreError> {
        self.index.query(filter).await
    }

    // ========================================
    // Read-modify-write plumbing
    // ========================================

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub(crate) fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    pub(crate) async fn lock(&self, id: WorkflowId) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }

    /// Read the canonical record, re-deriving progress from the tasks.
    pub(crate) async fn load(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        let Some(bytes) = self.records.read(&layout::workflow_key(id)).await? else {
            return Ok(None);
        };
        let mut workflow: Workflow = serde_json::from_slice(&bytes)?;
        workflow.refresh_progress();
        Ok(Some(workflow))
    }

    /// Record, then index, then events. Caller must hold the workflow lock.
    pub(crate) async fn persist(
        &self,
        workflow: &mut Workflow,
        events: Vec<EventInput>,
    ) -> Result<(), StoreError> {
        workflow.refresh_progress();
        self.write_record(workflow).await?;
        self.index.upsert(WorkflowIndexEntry::from(&*workflow)).await?;
        for event in events {
            self.events.append(workflow.id, event).await?;
        }
        Ok(())
    }

    /// Lock, load, apply `f`, persist.
    ///
    /// `f` returns `Ok(None)` for a not-found outcome; nothing is written then.
    pub(crate) async fn mutate<R>(
        &self,
        id: WorkflowId,
        f: impl FnOnce(&mut Workflow, DateTime<Utc>) -> Result<Option<(R, Vec<EventInput>)>, StoreError>,
    ) -> Result<Option<(R, Workflow)>, StoreError> {
        let _guard = self.lock(id).await;
        let Some(mut workflow) = self.load(id).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        let Some((value, events)) = f(&mut workflow, now).inspect_err(|e| {
            tracing::debug!(workflow_id = %id, kind = ?e.kind(), error = %e, "mutation rejected");
        })?
        else {
            return Ok(None);
        };
        workflow.touch(now);
        self.persist(&mut workflow, events).await.inspect_err(|e| {
            tracing::warn!(workflow_id = %id, kind = ?e.kind(), error = %e, "failed to persist workflow");
        })?;

        tracing::debug!(workflow_id = %id, progress = workflow.progress.percentage, "workflow persisted");
        Ok(Some((value, workflow)))
    }

    async fn write_record(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(workflow)?;
        self.records
            .write(&layout::workflow_key(workflow.id), &bytes)
            .await
    }

    pub(crate) fn build_task(&self, workflow_id: WorkflowId, spec: TaskSpec, order: usize) -> Task {
        Task {
            id: spec.id.unwrap_or_else(|| self.ids.generate_task_id()),
            workflow_id,
            title: spec.title,
            description: spec.description,
            priority: spec.priority,
            status: TaskStatus::Pending,
            order,
            depends_on: spec.depends_on,
            steps: spec
                .steps
                .into_iter()
                .map(|d| TaskStep::new(self.ids.generate_step_id(), d))
                .collect(),
            estimate: spec.estimate,
            completion_gate: spec.completion_gate,
            review_required: spec.review_required,
            note_ids: spec.note_ids,
            files: spec.files,
            tags: spec.tags,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Reject duplicate ids, references to unknown tasks, and cycles.
pub(crate) fn validate_dependencies(tasks: &[Task]) -> Result<(), StoreError> {
    let mut known = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !known.insert(task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }
    }
    for task in tasks {
        if let Some(missing) = task.depends_on.iter().find(|d| !known.contains(*d)) {
            return Err(StoreError::UnknownDependency {
                task: task.id,
                dependency: *missing,
            });
        }
    }
    if let Some(cycle) = DependencyGraph::from_tasks(tasks).detect_cycle() {
        return Err(StoreError::DependencyCycle {
            task: cycle[0],
            cycle,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskSpec, WorkflowFilter};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};

    fn store_with_clock() -> (WorkflowStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store = WorkflowStore::builder()
            .in_memory()
            .clock(clock.clone())
            .build()
            .unwrap();
        (store, clock)
    }

    #[tokio::test]
    async fn create_then_read_roundtrips() {
        let (store, _) = store_with_clock();
        let spec = WorkflowSpec::new("Auth", "web")
            .tag("security")
            .task(TaskSpec::new("schema").step("write migration"))
            .task(TaskSpec::new("login"));

        let created = store.create(spec).await.unwrap();
        let read = store.read(created.id).await.unwrap().unwrap();

        assert_eq!(read, created);
        assert_eq!(read.status, WorkflowStatus::Draft);
        assert_eq!(read.title, "Auth");
        assert_eq!(read.project, "web");
        assert_eq!(read.tags, vec!["security"]);
        assert_eq!(read.tasks.len(), 2);
        assert_eq!(read.tasks[1].order, 1);
        assert_eq!(read.tasks[0].steps[0].description, "write migration");
        assert!(read.tasks.iter().all(|t| t.workflow_id == created.id));
        assert_eq!(read.progress.total, 2);
    }

    #[tokio::test]
    async fn create_appends_created_event_and_index_entry() {
        let (store, _) = store_with_clock();
        let wf = store.create(WorkflowSpec::new("Auth", "web")).await.unwrap();

        let events = store.events().read_all(wf.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::WorkflowCreated);

        let listed = store.list(&WorkflowFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, wf.id);
    }

    #[tokio::test]
    async fn read_unknown_is_none() {
        let (store, _) = store_with_clock();
        let id = store.ids().generate_workflow_id();
        assert!(store.read(id).await.unwrap().is_none());
        assert!(store.update(id, WorkflowPatch::default()).await.unwrap().is_none());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn status_change_stamps_times_and_emits_one_event() {
        let (store, clock) = store_with_clock();
        let wf = store.create(WorkflowSpec::new("Auth", "web")).await.unwrap();

        clock.advance(Duration::minutes(5));
        let started = store
            .update(wf.id, WorkflowPatch::status(WorkflowStatus::Active))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(started.started_at, Some(clock.now()));
        assert_eq!(started.updated_at, clock.now());

        clock.advance(Duration::minutes(5));
        let done = store
            .update(wf.id, WorkflowPatch::status(WorkflowStatus::Completed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.completed_at, Some(clock.now()));
        assert!(done.started_at < done.completed_at);

        let types: Vec<_> = store
            .events()
            .read_all(wf.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                EventType::WorkflowCreated,
                EventType::WorkflowStarted,
                EventType::WorkflowCompleted
            ]
        );
    }

    #[tokio::test]
    async fn non_status_update_applies_only_present_fields() {
        let (store, _) = store_with_clock();
        let mut spec = WorkflowSpec::new("Auth", "web");
        spec.description = Some("original".into());
        let wf = store.create(spec).await.unwrap();

        let patch = WorkflowPatch {
            title: Some("Auth v2".into()),
            ..WorkflowPatch::default()
        };
        let updated = store.update(wf.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.title, "Auth v2");
        assert_eq!(updated.description.as_deref(), Some("original"));
        assert_eq!(updated.status, WorkflowStatus::Draft);
        assert_eq!(store.events().read_all(wf.id).await.unwrap().len(), 1);

        let listed = store.list(&WorkflowFilter::default()).await.unwrap();
        assert_eq!(listed[0].title, "Auth v2");
    }

    #[tokio::test]
    async fn list_orders_by_last_update() {
        let (store, clock) = store_with_clock();
        let a = store.create(WorkflowSpec::new("A", "p")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let b = store.create(WorkflowSpec::new("B", "p")).await.unwrap();
        clock.advance(Duration::seconds(1));
        store
            .update(a.id, WorkflowPatch::status(WorkflowStatus::Ready))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .list(&WorkflowFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn create_rejects_cyclic_initial_tasks() {
        let (store, _) = store_with_clock();
        let a = store.new_task_id();
        let b = store.new_task_id();
        let spec = WorkflowSpec::new("cyclic", "p")
            .task(TaskSpec::new("a").with_id(a).depends_on([b]))
            .task(TaskSpec::new("b").with_id(b).depends_on([a]));

        let err = store.create(spec).await.unwrap_err();
        assert!(matches!(err, StoreError::DependencyCycle { .. }));
        assert!(store.list(&WorkflowFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_unknown_dependency() {
        let (store, _) = store_with_clock();
        let ghost = store.new_task_id();
        let spec = WorkflowSpec::new("w", "p").task(TaskSpec::new("a").depends_on([ghost]));

        let err = store.create(spec).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownDependency { dependency, .. } if dependency == ghost));
    }

    #[tokio::test]
    async fn delete_removes_record_index_and_events() {
        let (store, _) = store_with_clock();
        let wf = store.create(WorkflowSpec::new("gone", "p")).await.unwrap();

        assert!(store.delete(wf.id).await.unwrap());
        assert!(store.read(wf.id).await.unwrap().is_none());
        assert!(store.list(&WorkflowFilter::default()).await.unwrap().is_empty());
        assert!(store.events().read_all(wf.id).await.unwrap().is_empty());
        assert!(!store.delete(wf.id).await.unwrap());
    }
}
