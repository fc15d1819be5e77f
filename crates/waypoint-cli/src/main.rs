use tracing_subscriber::EnvFilter;
use waypoint_core::domain::{
    CheckpointInput, CheckpointReason, Priority, TaskFilter, TaskPatch, TaskSpec, TaskStatus,
    WorkflowFilter, WorkflowPatch, WorkflowSpec, WorkflowStatus,
};
use waypoint_core::{StoreConfig, WorkflowStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) ストアを用意（WAYPOINT_ROOT / WAYPOINT_BATCH_SIZE で上書き可能）
    let config = StoreConfig::from_env();
    println!("store root: {}", config.root.display());
    let store = WorkflowStore::open(config)?;

    // (B) ワークフロー作成: schema -> (login, signup) -> e2e
    let schema = store.new_task_id();
    let login = store.new_task_id();
    let signup = store.new_task_id();
    let spec = WorkflowSpec::new("Auth", "demo")
        .tag("security")
        .task(
            TaskSpec::new("Design user schema")
                .with_id(schema)
                .priority(Priority::High)
                .step("draft tables")
                .step("write migration"),
        )
        .task(TaskSpec::new("Login endpoint").with_id(login).depends_on([schema]))
        .task(TaskSpec::new("Signup endpoint").with_id(signup).depends_on([schema]))
        .task(TaskSpec::new("End-to-end tests").depends_on([login, signup]).priority(Priority::Low));
    let wf = store.create(spec).await?;
    println!("created {} ({} tasks, {}%)", wf.id, wf.tasks.len(), wf.progress.percentage);

    store
        .update(wf.id, WorkflowPatch::status(WorkflowStatus::Ready))
        .await?;

    // (C) バッチを順に実行して、全タスクを完了させる
    let mut checkpointed = false;
    while let Some(batch) = store.scheduler().start_batch(wf.id).await? {
        println!("batch #{}: {} task(s)", batch.batch_number, batch.task_ids.len());

        for task_id in &batch.task_ids {
            let tasks = store.get_tasks(wf.id, &TaskFilter::default()).await?;
            if let Some(task) = tasks.iter().find(|t| t.id == *task_id) {
                for step in &task.steps {
                    store
                        .complete_step(wf.id, task.id, step.id, Some("done in demo".into()))
                        .await?;
                }
                println!("  completing: {}", task.title);
            }
            store
                .update_task(wf.id, *task_id, TaskPatch::status(TaskStatus::Completed))
                .await?;
        }

        // (D) 最初のバッチが終わったところでチェックポイント
        if !checkpointed {
            let input = CheckpointInput::new(CheckpointReason::PhaseComplete).notes("schema landed");
            if let Some(cp) = store.checkpoints().create(wf.id, input).await? {
                println!("{}", cp.summary());
            }
            checkpointed = true;
        }

        if let Some(current) = store.read(wf.id).await? {
            println!("progress: {}%", current.progress.percentage);
        }
    }

    if store.scheduler().is_stalled(wf.id).await? {
        println!("workflow is stalled");
    } else {
        store
            .update(wf.id, WorkflowPatch::status(WorkflowStatus::Completed))
            .await?;
    }

    // (E) 一覧とイベントログ
    for entry in store.list(&WorkflowFilter::default()).await? {
        println!("{} {:?} {}% {}", entry.id, entry.status, entry.progress.percentage, entry.title);
    }
    for event in store.events().read_recent(wf.id, 5).await? {
        println!("event: {:?} at {}", event.event_type, event.timestamp.to_rfc3339());
    }

    Ok(())
}
