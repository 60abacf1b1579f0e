// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender,
//! so tests can swap in a fake executor that records scheduled nodes and
//! emits `TaskCompleted` events directly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::tasks::{TaskContext, TaskRegistry};

use super::executor_loop::spawn_executor;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution. Completion is reported later
    /// through `RuntimeEvent::TaskCompleted`.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: forwards scheduled tasks to the background executor
/// loop, which runs them from the task registry.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ScheduledTask>,
}

impl RealExecutorBackend {
    /// Spawns the background executor loop immediately.
    pub fn new(
        registry: Arc<TaskRegistry>,
        ctx: TaskContext,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let tx = spawn_executor(registry, ctx, runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(task)
                    .await
                    .map_err(|err| anyhow!("executor loop is gone: {err}"))?;
            }
            Ok(())
        })
    }
}
