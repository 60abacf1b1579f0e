// src/exec/task_runner.rs

//! Individual task runner.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::tasks::{TaskContext, TaskRegistry};

/// Run one scheduled node and report its outcome to the runtime.
///
/// A successful run records its start time for the since-last-run filter of
/// the underlying registry task.
pub async fn run_task(
    task: ScheduledTask,
    registry: Arc<TaskRegistry>,
    ctx: TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let outcome = execute(&task, &registry, &ctx).await;

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, run_id = task.run_id, "runtime gone; completion dropped");
    }
}

async fn execute(task: &ScheduledTask, registry: &TaskRegistry, ctx: &TaskContext) -> TaskOutcome {
    let Some(body) = registry.get(&task.task) else {
        error!(task = %task.name, "no such task in registry");
        return TaskOutcome::Failed(format!("unknown task '{}'", task.task));
    };

    info!(task = %task.name, run_id = task.run_id, "starting task");
    let started = SystemTime::now();
    let clock = Instant::now();

    match body.run(ctx).await {
        Ok(report) => {
            ctx.last_runs.record(&task.task, started);
            info!(
                task = %task.name,
                run_id = task.run_id,
                files = report.written,
                bytes = report.bytes,
                skipped = report.skipped,
                elapsed_ms = clock.elapsed().as_millis() as u64,
                "finished task"
            );
            TaskOutcome::Success
        }
        Err(err) => {
            let message = format!("{err:#}");
            error!(
                task = %task.name,
                run_id = task.run_id,
                error = %message,
                elapsed_ms = clock.elapsed().as_millis() as u64,
                "task failed"
            );
            TaskOutcome::Failed(message)
        }
    }
}
