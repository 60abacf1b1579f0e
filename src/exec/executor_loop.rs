// src/exec/executor_loop.rs

//! Main executor loop that runs scheduled tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{NodeId, ScheduledTask};
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::tasks::{TaskContext, TaskRegistry};

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` uses to hand over
/// scheduled tasks. Each task runs in its own Tokio task; completion is
/// reported to `runtime_tx`.
pub fn spawn_executor(
    registry: Arc<TaskRegistry>,
    ctx: TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        debug!("executor loop started");

        let mut active: HashMap<NodeId, JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            active.retain(|_, handle| !handle.is_finished());
            handle_scheduled_task(task, &mut active, &registry, &ctx, &runtime_tx);
        }

        info!(in_flight = active.len(), "executor loop finished (channel closed)");
    });

    tx
}

fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<NodeId, JoinHandle<()>>,
    registry: &Arc<TaskRegistry>,
    ctx: &TaskContext,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    if active.contains_key(&task.name) {
        // The scheduler never dispatches a node twice within a run; a
        // leftover handle belongs to an earlier, aborted run.
        warn!(
            task = %task.name,
            run_id = task.run_id,
            "previous instance still running; starting a new one anyway"
        );
    }

    let name = task.name.clone();
    let registry = Arc::clone(registry);
    let ctx = ctx.clone();
    let rt_tx = runtime_tx.clone();

    let handle = tokio::spawn(async move {
        run_task(task, registry, ctx, rt_tx).await;
    });

    active.insert(name, handle);
}
