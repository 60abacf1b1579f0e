// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::{ScheduledTask, Scheduler};
use crate::errors::{Result, SitepipeError};
use crate::exec::ExecutorBackend;
use crate::types::TriggerWhileRunningBehaviour;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent, RuntimeOptions, TriggerReason};

/// IO shell around [`CoreRuntime`]: reads `RuntimeEvent`s from a channel and
/// hands dispatched tasks to an `ExecutorBackend`.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Main event loop.
    ///
    /// Returns `Err(SitepipeError::TaskFailed)` when a task fails while the
    /// core runs in fail-fast mode.
    pub async fn run(mut self) -> Result<()> {
        info!("sitepipe runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                debug!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
            CoreCommand::Abort { task, message } => {
                error!(task = %task, error = %message, "task failed; aborting");
                return Err(SitepipeError::TaskFailed { task, message }.into());
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

/// Run every node of the scheduler's graph once and wait for the outcome.
///
/// The graph roots are seeded as manual triggers. The first failing task
/// aborts the run and is returned as `SitepipeError::TaskFailed`.
pub async fn run_once<E: ExecutorBackend>(
    scheduler: Scheduler,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    runtime_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
) -> Result<()> {
    let roots = scheduler.graph().roots();

    if roots.is_empty() {
        info!("graph is empty; nothing to run");
        return Ok(());
    }

    for root in roots {
        runtime_tx
            .send(RuntimeEvent::TaskTriggered {
                task: root,
                reason: TriggerReason::Manual,
            })
            .await
            .map_err(|err| anyhow::anyhow!("failed to seed graph: {err}"))?;
    }
    drop(runtime_tx);

    let core = CoreRuntime::new(
        scheduler,
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions::one_shot(),
    );
    Runtime::new(core, runtime_rx, executor).run().await
}
